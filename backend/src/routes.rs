use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::TryStreamExt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::routes::{self as auth_routes, DASHBOARD_PATH};
use crate::auth::{AuthenticatedUser, IdentityProvider, SessionGate, SessionManager};
use crate::dashboard::DashboardStats;
use crate::db::models::UploadRecord;
use crate::db::{UploadRepository, UserRepository};
use crate::flash::{self, FlashMessage};
use crate::inference::ModelAdapter;
use crate::storage::{StorageError, UPLOAD_URL_PREFIX, UploadStore};
use crate::views;
use shared::ClassificationResult;

pub const IMAGE_FIELD: &str = "image";

/// Process-scoped services shared by every worker.
#[derive(Clone)]
pub struct AppServices {
    pub model: Arc<ModelAdapter>,
    pub uploads: Arc<dyn UploadRepository>,
    pub users: Arc<dyn UserRepository>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: SessionManager,
    pub store: UploadStore,
    pub static_dir: PathBuf,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, services: &AppServices) {
    let gate = SessionGate::new(services.sessions.clone());

    cfg.app_data(web::Data::from(services.model.clone()))
        .app_data(web::Data::from(services.uploads.clone()))
        .app_data(web::Data::from(services.users.clone()))
        .app_data(web::Data::from(services.identity.clone()))
        .app_data(web::Data::new(services.sessions.clone()))
        .app_data(web::Data::new(services.store.clone()))
        .service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/register")
                .route(web::get().to(auth_routes::register_form))
                .route(web::post().to(auth_routes::register)),
        )
        .service(
            web::resource("/login")
                .route(web::get().to(auth_routes::login_form))
                .route(web::post().to(auth_routes::login)),
        )
        .service(
            web::resource("/logout")
                .wrap(gate.clone())
                .route(web::get().to(auth_routes::logout)),
        )
        .service(
            web::resource(DASHBOARD_PATH)
                .wrap(gate.clone())
                .route(web::get().to(maiscan)),
        )
        .service(
            web::resource("/predict")
                .wrap(gate)
                .route(web::post().to(predict)),
        )
        // Must precede the `/static` mount, which would otherwise shadow it.
        .service(Files::new(UPLOAD_URL_PREFIX, services.store.upload_dir()))
        .service(Files::new("/static", &services.static_dir))
        .default_service(web::to(not_found));
}

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::html())
        .body(body)
}

async fn home(req: HttpRequest) -> HttpResponse {
    flash::render_page(&req, StatusCode::OK, None, views::home)
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    log::warn!("No route for {} {}", req.method(), req.path());
    html(StatusCode::NOT_FOUND, views::not_found())
}

async fn maiscan(
    req: HttpRequest,
    user: AuthenticatedUser,
    uploads: web::Data<dyn UploadRepository>,
) -> HttpResponse {
    let AuthenticatedUser(user) = user;
    let stats = match uploads.list_uploads(user.id).await {
        Ok(records) => DashboardStats::from_records(records),
        Err(e) => {
            log::error!("Error loading dashboard for {}: {}", user.id, e);
            DashboardStats::empty()
        }
    };

    flash::render_page(&req, StatusCode::OK, None, |messages| {
        views::dashboard(&user.email, &stats, messages)
    })
}

struct ImageUpload {
    filename: String,
    data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("no image field in request")]
    Missing,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
}

impl UploadError {
    fn flash(&self) -> FlashMessage {
        match self {
            UploadError::Missing => FlashMessage::danger("No image uploaded."),
            UploadError::Storage(StorageError::MissingFile)
            | UploadError::Storage(StorageError::InvalidFileType(_)) => {
                FlashMessage::danger("Invalid file type.")
            }
            UploadError::Storage(StorageError::FileTooLarge) => {
                FlashMessage::danger("File is too large.")
            }
            UploadError::Storage(StorageError::Io(_)) | UploadError::Multipart(_) => {
                FlashMessage::danger("Error processing image.")
            }
        }
    }
}

/// A body that cannot be split into fields has no image field either.
fn missing_image(error: actix_multipart::MultipartError) -> UploadError {
    log::warn!("Unreadable multipart body: {}", error);
    UploadError::Missing
}

/// Reads the `image` field, checking the extension before the body and
/// stopping as soon as the size cap is exceeded.
async fn read_image_field(
    payload: &mut Multipart,
    store: &UploadStore,
) -> Result<ImageUpload, UploadError> {
    while let Some(mut field) = payload.try_next().await.map_err(missing_image)? {
        if field.name() != Some(IMAGE_FIELD) {
            while field.try_next().await.map_err(missing_image)?.is_some() {}
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();
        store.validate_filename(&filename)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            store.validate_size(data.len() + chunk.len())?;
            data.extend_from_slice(&chunk);
        }
        return Ok(ImageUpload { filename, data });
    }
    Err(UploadError::Missing)
}

async fn predict(
    user: AuthenticatedUser,
    mut payload: Multipart,
    model: web::Data<ModelAdapter>,
    uploads: web::Data<dyn UploadRepository>,
    store: web::Data<UploadStore>,
) -> HttpResponse {
    let AuthenticatedUser(user) = user;
    let rejected = |error: UploadError| {
        log::warn!("Rejected upload from {}: {}", user.id, error);
        flash::redirect(DASHBOARD_PATH, error.flash()).finish()
    };

    let upload = match read_image_field(&mut payload, &store).await {
        Ok(upload) => upload,
        Err(e) => return rejected(e),
    };
    let stored = match store.save(&upload.filename, &upload.data).await {
        Ok(stored) => stored,
        Err(e) => return rejected(e.into()),
    };

    let image_path = stored.path.clone();
    let classifier = model.clone();
    let result = web::block(move || classifier.classify(&image_path))
        .await
        .unwrap_or_else(|e| {
            log::error!("Classification task failed: {}", e);
            ClassificationResult::error()
        });
    log::info!(
        "Classified {} for {} as {} ({:.4})",
        stored.filename,
        user.id,
        result.prediction,
        result.confidence
    );

    let Some(label) = result.prediction.disease() else {
        return html(
            StatusCode::OK,
            views::invalid_image(&result.prediction, &stored.filename, result.confidence),
        );
    };

    let record = UploadRecord::from_classification(user.id, stored.filename.clone(), &result);
    if let Err(e) = uploads.record_upload(&record).await {
        log::error!("Failed to record upload {}: {}", stored.filename, e);
        return flash::redirect(
            DASHBOARD_PATH,
            FlashMessage::danger("Error processing image."),
        )
        .finish();
    }

    html(
        StatusCode::OK,
        views::result(label, &stored.filename, result.confidence),
    )
}
