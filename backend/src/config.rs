use rand::Rng;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub const CONFIG_FILE_VAR: &str = "MAISCAN_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub secret_key: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub model_path: PathBuf,
    pub cognito: CognitoConfig,
    pub dynamodb: DynamoDbConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoDbConfig {
    pub users_table: String,
    pub uploads_table: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            secret_key: String::new(),
            session_ttl_hours: 24,
            cookie_secure: false,
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("static/user_image"),
            max_upload_bytes: 16 * 1024 * 1024,
            allowed_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            model_path: PathBuf::from("maiscan_disease_model.pt"),
            cognito: CognitoConfig::default(),
            dynamodb: DynamoDbConfig::default(),
        }
    }
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            users_table: "Users".to_string(),
            uploads_table: "UploadedImages".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `.env`, the optional YAML file named by `MAISCAN_CONFIG`, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let yaml = match env::var(CONFIG_FILE_VAR) {
            Ok(path) => {
                log::info!("Reading configuration from {}", path);
                Some(std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?)
            }
            Err(_) => None,
        };

        Self::from_sources(yaml.as_deref(), |key| env::var(key).ok())
    }

    pub fn from_sources<F>(yaml: Option<&str>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = match yaml {
            Some(contents) => serde_yaml::from_str(contents)?,
            None => AppConfig::default(),
        };

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            config.secret_key = secret;
        }
        if let Some(ttl) = lookup("SESSION_TTL_HOURS") {
            config.session_ttl_hours = parse("SESSION_TTL_HOURS", &ttl)?;
        }
        if let Some(secure) = lookup("COOKIE_SECURE") {
            config.cookie_secure = parse("COOKIE_SECURE", &secure)?;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("UPLOAD_FOLDER") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(limit) = lookup("MAX_CONTENT_LENGTH") {
            config.max_upload_bytes = parse("MAX_CONTENT_LENGTH", &limit)?;
        }
        if let Some(extensions) = lookup("ALLOWED_EXTENSIONS") {
            config.allowed_extensions = extensions
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
        }
        if let Some(path) = lookup("MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(pool) = lookup("COGNITO_USER_POOL_ID") {
            config.cognito.user_pool_id = pool;
        }
        if let Some(client_id) = lookup("COGNITO_CLIENT_ID") {
            config.cognito.client_id = client_id;
        }
        if let Some(secret) = lookup("COGNITO_CLIENT_SECRET") {
            config.cognito.client_secret = Some(secret).filter(|s| !s.is_empty());
        }
        if let Some(table) = lookup("DYNAMODB_USERS_TABLE") {
            config.dynamodb.users_table = table;
        }
        if let Some(table) = lookup("DYNAMODB_UPLOADS_TABLE") {
            config.dynamodb.uploads_table = table;
        }

        config.validate()?;

        if config.secret_key.is_empty() {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart");
            config.secret_key = hex::encode(rand::rng().random::<[u8; 16]>());
        }

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cognito.user_pool_id.is_empty() {
            return Err(ConfigError::Missing("COGNITO_USER_POOL_ID"));
        }
        if self.cognito.client_id.is_empty() {
            return Err(ConfigError::Missing("COGNITO_CLIENT_ID"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid {
                key: "ALLOWED_EXTENSIONS",
                value: String::new(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONTENT_LENGTH",
                value: "0".to_string(),
            });
        }
        self.session_ttl()?;
        Ok(())
    }

    /// Session lifetime; must be positive and representable as a duration.
    pub fn session_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_hours(self.session_ttl_hours)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                value: self.session_ttl_hours.to_string(),
            })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cognito_looks_configured(&self) -> bool {
        !self.cognito.user_pool_id.contains("your_cognito")
            && !self.cognito.client_id.contains("your_cognito")
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
