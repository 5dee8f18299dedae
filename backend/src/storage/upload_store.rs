use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// URL prefix the upload directory is mounted under.
pub const UPLOAD_URL_PREFIX: &str = "/static/user_image";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("No file selected")]
    MissingFile,
    #[error("File type not allowed: {0}")]
    InvalidFileType(String),
    #[error("File too large")]
    FileTooLarge,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub filename: String,
    pub path: PathBuf,
}

pub fn public_url(filename: &str) -> String {
    format!("{}/{}", UPLOAD_URL_PREFIX, urlencoding::encode(filename))
}

/// Validates and writes uploaded images into a single directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    upload_dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(upload_dir: PathBuf, allowed_extensions: Vec<String>, max_bytes: usize) -> Self {
        Self {
            upload_dir,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            max_bytes,
        }
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Returns the lower-cased extension when it is on the allow-list.
    pub fn validate_filename(&self, filename: &str) -> Result<String, StorageError> {
        if filename.is_empty() {
            return Err(StorageError::MissingFile);
        }
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .ok_or_else(|| StorageError::InvalidFileType(filename.to_string()))?;
        if self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            Ok(extension)
        } else {
            Err(StorageError::InvalidFileType(filename.to_string()))
        }
    }

    pub fn validate_size(&self, len: usize) -> Result<(), StorageError> {
        if len > self.max_bytes {
            return Err(StorageError::FileTooLarge);
        }
        Ok(())
    }

    /// Timestamp and random token prefixed, sanitized name.
    pub fn stored_name(&self, original: &str, extension: &str) -> String {
        let mut safe = secure_filename(original);
        if safe.is_empty() || !safe.to_lowercase().ends_with(&format!(".{}", extension)) {
            safe = format!("image.{}", extension);
        }
        let token: u32 = rand::rng().random();
        format!(
            "{}_{:08x}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            token,
            safe
        )
    }

    /// Validates then writes. Nothing touches the disk if validation fails.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredUpload, StorageError> {
        let extension = self.validate_filename(original_name)?;
        self.validate_size(data.len())?;

        let filename = self.stored_name(original_name, &extension);
        let path = self.upload_dir.join(&filename);
        tokio::fs::write(&path, data).await?;

        log::info!(
            "Stored upload {} ({} bytes, sha256 {})",
            filename,
            data.len(),
            calculate_image_hash(data)
        );
        Ok(StoredUpload { filename, path })
    }
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

/// Reduces a client-supplied name to `[A-Za-z0-9._-]`, with path separators
/// and whitespace collapsed to `_` and no leading or trailing dots.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name.chars().filter(|c| c.is_ascii()).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}
