use actix_web::HttpRequest;
use actix_web::cookie::{Cookie, SameSite, time};
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use uuid::Uuid;

use super::jwt::{JwtError, JwtService};
use super::models::AuthUser;

pub const SESSION_COOKIE: &str = "maiscan_session";

#[derive(Debug)]
pub enum SessionError {
    Missing,
    InvalidHeaderFormat,
    VerificationFailed(JwtError),
    InvalidUuidInClaims(String),
}

impl SessionError {
    pub fn log_message(&self, path: &str) -> String {
        match self {
            SessionError::Missing => format!("No session found for path: {}", path),
            SessionError::InvalidHeaderFormat => {
                format!("Invalid Authorization header format for path: {}", path)
            }
            SessionError::VerificationFailed(e) => {
                format!("Session verification failed for path {}: {}", path, e)
            }
            SessionError::InvalidUuidInClaims(sub) => {
                format!("Invalid UUID in session claims for path {}: {}", path, sub)
            }
        }
    }

    /// Whether the client holds a cookie that should be discarded.
    pub fn is_stale(&self) -> bool {
        !matches!(self, SessionError::Missing)
    }
}

/// Issues and verifies the signed session cookie.
#[derive(Clone)]
pub struct SessionManager {
    jwt_service: JwtService,
    secure_cookie: bool,
}

impl SessionManager {
    pub fn new(jwt_service: JwtService, secure_cookie: bool) -> Self {
        Self {
            jwt_service,
            secure_cookie,
        }
    }

    pub fn issue_cookie(&self, user: &AuthUser) -> Result<Cookie<'static>, JwtError> {
        let token = self.jwt_service.generate_token(user)?;
        let max_age = time::Duration::seconds(self.jwt_service.ttl().num_seconds());
        Ok(Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .finish())
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }

    /// Resolves the caller from the session cookie, falling back to a
    /// `Bearer` token for non-browser clients.
    pub fn authenticate(&self, req: &HttpRequest) -> Result<AuthUser, SessionError> {
        let token = match req.cookie(SESSION_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
            _ => bearer_token(req.headers())?.ok_or(SessionError::Missing)?,
        };

        let claims = self
            .jwt_service
            .verify_token(&token)
            .map_err(SessionError::VerificationFailed)?;
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| SessionError::InvalidUuidInClaims(claims.sub.clone()))?;

        Ok(AuthUser {
            id,
            email: claims.email,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, SessionError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| SessionError::InvalidHeaderFormat)?;
    Ok(value.strip_prefix("Bearer ").map(str::to_string))
}
