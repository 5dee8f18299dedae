pub mod upload_store;

pub use upload_store::{StorageError, StoredUpload, UploadStore, UPLOAD_URL_PREFIX};
