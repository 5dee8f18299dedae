use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::ClassificationResult;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    // Cognito fields
    pub cognito_sub: String,
    pub cognito_access_token: Option<String>,
    pub cognito_refresh_token: Option<String>,
    // User fields
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Metadata for one classified upload. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub disease_type: String,
    pub confidence: f32,
    pub upload_date: DateTime<Utc>,
}

impl User {
    pub fn new(cognito_sub: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            cognito_sub,
            cognito_access_token: None,
            cognito_refresh_token: None,
            email,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        }
    }

    pub fn update_last_login(&mut self) {
        self.last_login = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn clear_tokens(&mut self) {
        self.cognito_access_token = None;
        self.cognito_refresh_token = None;
        self.updated_at = Utc::now();
    }
}

impl UploadRecord {
    pub fn from_classification(
        user_id: Uuid,
        filename: String,
        result: &ClassificationResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            filename,
            disease_type: result.prediction.to_string(),
            confidence: result.confidence,
            upload_date: Utc::now(),
        }
    }
}
