use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account already exists")]
    AccountExists,
    #[error("Password rejected by policy: {0}")]
    InvalidPassword(String),
    #[error("Identity provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub identity: ProviderIdentity,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// External account service. Credentials are verified there, never locally.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(&self, email: &str, password: &str)
    -> Result<ProviderIdentity, IdentityError>;

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}
