use actix_web::{App, HttpServer, middleware};
use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use backend::auth::SessionManager;
use backend::auth::cognito_service::CognitoService;
use backend::auth::jwt::JwtService;
use backend::config::AppConfig;
use backend::db::DynamoDbRepository;
use backend::error::error_pages;
use backend::inference::ModelAdapter;
use backend::routes::{AppServices, configure_routes};
use backend::storage::UploadStore;
use shared::DiseaseLabel;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    DiseaseLabel::validate_mapping().map_err(|e| {
        log::error!("Label table is inconsistent: {}", e);
        std::io::Error::other(e)
    })?;

    let model = match ModelAdapter::load(&config.model_path) {
        Ok(model) => {
            log::info!("Model loaded successfully from {}", config.model_path.display());
            model
        }
        Err(e) => {
            log::error!("Error loading model: {}", e);
            log::warn!("Every classification will report \"Error\" until a model is available");
            ModelAdapter::unavailable()
        }
    };

    let store = UploadStore::new(
        config.upload_dir.clone(),
        config.allowed_extensions.clone(),
        config.max_upload_bytes,
    );
    store.ensure_dir()?;
    log::info!("Uploads are stored in {}", store.upload_dir().display());

    // Initialize AWS configuration
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let dynamodb_client = DynamoDbClient::new(&aws_config);
    let cognito_client = CognitoClient::new(&aws_config);

    let repository = Arc::new(DynamoDbRepository::new(
        dynamodb_client,
        config.dynamodb.users_table.clone(),
        config.dynamodb.uploads_table.clone(),
    ));
    repository.check_tables().await;

    if config.cognito_looks_configured() {
        log::info!("Cognito configuration detected");
    } else {
        log::warn!("Cognito is not fully configured. Check COGNITO_USER_POOL_ID and COGNITO_CLIENT_ID.");
    }
    let identity = Arc::new(CognitoService::new(
        cognito_client,
        config.cognito.user_pool_id.clone(),
        config.cognito.client_id.clone(),
        config.cognito.client_secret.clone(),
    ));

    let session_ttl = config
        .session_ttl()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let jwt_service = JwtService::new(&config.secret_key, session_ttl);

    let services = AppServices {
        model: Arc::new(model),
        uploads: repository.clone(),
        users: repository,
        identity,
        sessions: SessionManager::new(jwt_service, config.cookie_secure),
        store,
        static_dir: config.static_dir.clone(),
    };

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(error_pages())
            .wrap(middleware::Logger::default())
            .configure(|cfg| configure_routes(cfg, &services))
    })
    .bind(&bind_address)?
    .run()
    .await
}
