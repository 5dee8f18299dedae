use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::provider::{IdentityError, IdentityProvider, ProviderIdentity, ProviderSession};

type HmacSha256 = Hmac<Sha256>;

/// Email/password accounts in a Cognito user pool.
#[derive(Clone)]
pub struct CognitoService {
    client: CognitoClient,
    user_pool_id: String,
    client_id: String,
    client_secret: Option<String>,
}

impl CognitoService {
    pub fn new(
        client: CognitoClient,
        user_pool_id: String,
        client_id: String,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            user_pool_id,
            client_id,
            client_secret,
        }
    }

    fn secret_hash(&self, username: &str) -> Result<Option<String>, IdentityError> {
        self.client_secret
            .as_deref()
            .map(|secret| secret_hash(secret, username, &self.client_id))
            .transpose()
    }

    async fn identity_for(&self, access_token: &str) -> Result<ProviderIdentity, IdentityError> {
        let user = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.into_service_error().to_string()))?;

        let attribute = |name: &str| {
            user.user_attributes()
                .iter()
                .find(|attr| attr.name() == name)
                .and_then(|attr| attr.value())
                .map(str::to_string)
        };

        let subject = attribute("sub")
            .ok_or_else(|| IdentityError::Provider("user has no sub attribute".to_string()))?;
        let email = attribute("email").unwrap_or_else(|| user.username().to_string());
        Ok(ProviderIdentity { subject, email })
    }
}

#[async_trait]
impl IdentityProvider for CognitoService {
    async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, IdentityError> {
        let email_attribute = AttributeType::builder()
            .name("email")
            .value(email)
            .build()
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let output = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .username(email)
            .password(password)
            .set_secret_hash(self.secret_hash(email)?)
            .user_attributes(email_attribute)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_username_exists_exception() {
                    IdentityError::AccountExists
                } else if service_error.is_invalid_password_exception() {
                    IdentityError::InvalidPassword(service_error.to_string())
                } else {
                    IdentityError::Provider(service_error.to_string())
                }
            })?;

        // Accounts are usable immediately, without an email confirmation step.
        self.client
            .admin_confirm_sign_up()
            .user_pool_id(&self.user_pool_id)
            .username(email)
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.into_service_error().to_string()))?;

        log::info!("Registered Cognito account {}", output.user_sub());
        Ok(ProviderIdentity {
            subject: output.user_sub().to_string(),
            email: email.to_string(),
        })
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let mut request = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", email)
            .auth_parameters("PASSWORD", password);
        if let Some(hash) = self.secret_hash(email)? {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let output = request.send().await.map_err(|e| {
            let service_error = e.into_service_error();
            if service_error.is_not_authorized_exception()
                || service_error.is_user_not_found_exception()
                || service_error.is_user_not_confirmed_exception()
            {
                IdentityError::InvalidCredentials
            } else {
                IdentityError::Provider(service_error.to_string())
            }
        })?;

        // A pending challenge (e.g. forced password change) is not a session.
        let result = output.authentication_result().ok_or_else(|| {
            log::warn!(
                "Cognito returned challenge {:?} instead of tokens",
                output.challenge_name()
            );
            IdentityError::InvalidCredentials
        })?;
        let access_token = result
            .access_token()
            .ok_or_else(|| IdentityError::Provider("no access token issued".to_string()))?
            .to_string();
        let refresh_token = result.refresh_token().map(str::to_string);

        let identity = self.identity_for(&access_token).await?;
        Ok(ProviderSession {
            identity,
            access_token,
            refresh_token,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.into_service_error().to_string()))?;
        Ok(())
    }
}

/// `Base64(HMAC-SHA256(client_secret, username + client_id))`.
pub fn secret_hash(
    client_secret: &str,
    username: &str,
    client_id: &str,
) -> Result<String, IdentityError> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| IdentityError::Provider(e.to_string()))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
