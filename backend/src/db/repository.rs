use async_trait::async_trait;
use uuid::Uuid;

use super::models::{UploadRecord, User};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Item not found")]
    NotFound,
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// Append-only store of classified uploads.
#[async_trait]
pub trait UploadRepository: Send + Sync {
    async fn record_upload(&self, record: &UploadRecord) -> Result<(), RepositoryError>;

    async fn list_uploads(&self, user_id: Uuid) -> Result<Vec<UploadRecord>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_cognito_sub(
        &self,
        cognito_sub: &str,
    ) -> Result<Option<User>, RepositoryError>;

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn get_user(&self, user_id: Uuid) -> Result<User, RepositoryError> {
        self.get_user_by_id(user_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
