use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::models::{UploadRecord, User};
use super::repository::{RepositoryError, UploadRepository, UserRepository};

/// Process-local repository backing the test suite.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<Mutex<Vec<User>>>,
    uploads: Arc<Mutex<Vec<UploadRecord>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> usize {
        lock(&self.uploads).map(|uploads| uploads.len()).unwrap_or(0)
    }

    pub fn user_count(&self) -> usize {
        lock(&self.users).map(|users| users.len()).unwrap_or(0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::DynamoDb("in-memory store poisoned".to_string()))
}

#[async_trait]
impl UploadRepository for InMemoryRepository {
    async fn record_upload(&self, record: &UploadRecord) -> Result<(), RepositoryError> {
        lock(&self.uploads)?.push(record.clone());
        Ok(())
    }

    async fn list_uploads(&self, user_id: Uuid) -> Result<Vec<UploadRecord>, RepositoryError> {
        let mut records: Vec<UploadRecord> = lock(&self.uploads)?
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(records)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = lock(&self.users)?;
        if users.iter().any(|existing| existing.id == user.id) {
            return Err(RepositoryError::DynamoDb(format!(
                "user {} already exists",
                user.id
            )));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.users)?
            .iter()
            .find(|user| user.id == user_id)
            .cloned())
    }

    async fn get_user_by_cognito_sub(
        &self,
        cognito_sub: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.users)?
            .iter()
            .find(|user| user.cognito_sub == cognito_sub)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = lock(&self.users)?;
        let existing = users
            .iter_mut()
            .find(|existing| existing.id == user.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = user.clone();
        Ok(())
    }
}
