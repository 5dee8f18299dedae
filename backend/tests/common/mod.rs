//! Shared harness for router integration tests: in-memory repository, fake
//! identity provider and a fixed-output classifier over temp directories.
#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::test::TestRequest;
use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgb};
use ndarray::Array4;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strum::EnumCount;
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

use backend::auth::jwt::JwtService;
use backend::auth::models::AuthUser;
use backend::auth::session::SESSION_COOKIE;
use backend::auth::{
    IdentityError, IdentityProvider, ProviderIdentity, ProviderSession, SessionManager,
};
use backend::db::models::UploadRecord;
use backend::db::{InMemoryRepository, RepositoryError, UploadRepository};
use backend::flash::FLASH_COOKIE;
use backend::inference::{InferenceBackend, InferenceError, ModelAdapter};
use backend::routes::AppServices;
use backend::storage::UploadStore;
use shared::DiseaseLabel;

pub const BOUNDARY: &str = "maiscan-test-boundary";
pub const MIN_PASSWORD_LEN: usize = 8;

/// Builds the application service the same way `main` does.
#[macro_export]
macro_rules! init_app {
    ($harness:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(backend::error::error_pages())
                .configure(|cfg| backend::routes::configure_routes(cfg, &$harness.services)),
        )
        .await
    };
}

pub struct FixedBackend(pub Vec<f32>);

impl InferenceBackend for FixedBackend {
    fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        Ok(self.0.clone())
    }
}

/// Accounts keyed by email; passwords shorter than eight characters fail
/// the policy check.
#[derive(Default)]
pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, (String, String)>>,
    sign_outs: AtomicUsize,
}

impl FakeIdentity {
    pub fn subject_for(&self, email: &str) -> Option<String> {
        self.accounts
            .lock()
            .unwrap()
            .get(email)
            .map(|(_, subject)| subject.clone())
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, IdentityError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(IdentityError::InvalidPassword("too short".to_string()));
        }
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(IdentityError::AccountExists);
        }
        let subject = Uuid::new_v4().to_string();
        accounts.insert(email.to_string(), (password.to_string(), subject.clone()));
        Ok(ProviderIdentity {
            subject,
            email: email.to_string(),
        })
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some((stored, subject)) if stored == password => Ok(ProviderSession {
                identity: ProviderIdentity {
                    subject: subject.clone(),
                    email: email.to_string(),
                },
                access_token: format!("access-{}", subject),
                refresh_token: Some(format!("refresh-{}", subject)),
            }),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Upload table that is unreachable for both writes and reads.
pub struct FailingUploads;

#[async_trait]
impl UploadRepository for FailingUploads {
    async fn record_upload(&self, _record: &UploadRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::DynamoDb("table unavailable".to_string()))
    }

    async fn list_uploads(&self, _user_id: Uuid) -> Result<Vec<UploadRecord>, RepositoryError> {
        Err(RepositoryError::DynamoDb("table unavailable".to_string()))
    }
}

pub struct Harness {
    pub services: AppServices,
    pub repo: InMemoryRepository,
    pub identity: Arc<FakeIdentity>,
    pub upload_dir: TempDir,
    pub static_dir: TempDir,
}

impl Harness {
    /// `output` is what the classifier returns for every image; `None`
    /// simulates a missing model.
    pub fn new(output: Option<Vec<f32>>) -> Self {
        let upload_dir = tempdir().unwrap();
        let static_dir = tempdir().unwrap();
        let repo = InMemoryRepository::new();
        let identity = Arc::new(FakeIdentity::default());

        let model = match output {
            Some(output) => ModelAdapter::with_backend(Box::new(FixedBackend(output))).unwrap(),
            None => ModelAdapter::unavailable(),
        };
        let store = UploadStore::new(
            upload_dir.path().to_path_buf(),
            vec!["png".into(), "jpg".into(), "jpeg".into()],
            1024 * 1024,
        );

        let services = AppServices {
            model: Arc::new(model),
            uploads: Arc::new(repo.clone()),
            users: Arc::new(repo.clone()),
            identity: identity.clone(),
            sessions: SessionManager::new(
                JwtService::new("integration-secret", chrono::Duration::hours(1)),
                false,
            ),
            store,
            static_dir: static_dir.path().to_path_buf(),
        };

        Self {
            services,
            repo,
            identity,
            upload_dir,
            static_dir,
        }
    }

    pub fn confident(label: DiseaseLabel, confidence: f32) -> Self {
        Self::new(Some(probabilities(label.index(), confidence)))
    }

    pub fn session_cookie(&self, user: &AuthUser) -> Cookie<'static> {
        self.services.sessions.issue_cookie(user).unwrap()
    }

    pub fn with_failing_uploads(mut self) -> Self {
        self.services.uploads = Arc::new(FailingUploads);
        self
    }

    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

pub fn grower() -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        email: "grower@example.com".to_string(),
    }
}

/// `confidence` at `index`, the remainder spread evenly over the other labels.
pub fn probabilities(index: usize, confidence: f32) -> Vec<f32> {
    let rest = (1.0 - confidence) / (DiseaseLabel::COUNT - 1) as f32;
    let mut probs = vec![rest; DiseaseLabel::COUNT];
    probs[index] = confidence;
    probs
}

pub fn png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(32, 32, Rgb([34u8, 139, 34]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(field: &str, filename: &str, data: &[u8]) -> TestRequest {
    TestRequest::post()
        .uri("/predict")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(field, filename, data))
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn flash_cookie<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == FLASH_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.into_owned())
}
