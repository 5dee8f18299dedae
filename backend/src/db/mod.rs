pub mod dynamodb_repository;
pub mod memory;
pub mod models;
pub mod repository;

pub use dynamodb_repository::DynamoDbRepository;
pub use memory::InMemoryRepository;
pub use repository::{RepositoryError, UploadRepository, UserRepository};
