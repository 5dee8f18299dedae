use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};

use super::middleware::{AuthenticatedUser, LOGIN_PATH};
use super::models::{AuthUser, CredentialsForm};
use super::provider::{IdentityError, IdentityProvider, ProviderSession};
use super::session::SessionManager;
use crate::db::models::User;
use crate::db::{RepositoryError, UserRepository};
use crate::error::AppError;
use crate::flash::{self, FlashMessage};
use crate::views;

pub const DASHBOARD_PATH: &str = "/maiscan";

const MISSING_FIELDS: &str = "Email and password are required.";
const INVALID_LOGIN: &str = "Invalid email or password.";

pub async fn register_form(req: HttpRequest) -> HttpResponse {
    flash::render_page(&req, StatusCode::OK, None, views::register)
}

pub async fn register(
    req: HttpRequest,
    form: web::Form<CredentialsForm>,
    identity: web::Data<dyn IdentityProvider>,
    users: web::Data<dyn UserRepository>,
) -> HttpResponse {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return flash::render_page(
            &req,
            StatusCode::OK,
            Some(FlashMessage::danger(MISSING_FIELDS)),
            views::register,
        );
    }

    match identity.register(email, &form.password).await {
        Ok(account) => {
            let user = User::new(account.subject, account.email);
            // The row is created on first login if this write is lost.
            match users.create_user(&user).await {
                Ok(()) => log::info!("Registered user {}", user.id),
                Err(e) => log::warn!("Account registered but user row not stored: {}", e),
            }
            flash::redirect(
                LOGIN_PATH,
                FlashMessage::success("Registration successful! Please log in."),
            )
            .finish()
        }
        Err(IdentityError::InvalidPassword(reason)) => {
            log::warn!("Registration rejected by password policy: {}", reason);
            flash::render_page(
                &req,
                StatusCode::OK,
                Some(FlashMessage::danger(
                    "Registration failed: the password does not meet the requirements.",
                )),
                views::register,
            )
        }
        Err(e) => {
            log::warn!("Registration failed: {}", e);
            flash::render_page(
                &req,
                StatusCode::OK,
                Some(FlashMessage::danger(
                    "Registration failed. Please check your details and try again.",
                )),
                views::register,
            )
        }
    }
}

pub async fn login_form(req: HttpRequest) -> HttpResponse {
    flash::render_page(&req, StatusCode::OK, None, views::login)
}

pub async fn login(
    req: HttpRequest,
    form: web::Form<CredentialsForm>,
    identity: web::Data<dyn IdentityProvider>,
    users: web::Data<dyn UserRepository>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return Ok(flash::render_page(
            &req,
            StatusCode::OK,
            Some(FlashMessage::danger(MISSING_FIELDS)),
            views::login,
        ));
    }

    let rejected = |req: &HttpRequest| {
        flash::render_page(
            req,
            StatusCode::OK,
            Some(FlashMessage::danger(INVALID_LOGIN)),
            views::login,
        )
    };

    let session = match identity.authenticate(email, &form.password).await {
        Ok(session) => session,
        Err(IdentityError::InvalidCredentials) => {
            log::warn!("Rejected login attempt");
            return Ok(rejected(&req));
        }
        Err(e) => {
            log::error!("Identity provider failed during login: {}", e);
            return Ok(rejected(&req));
        }
    };

    let user = resolve_user(users.get_ref(), session).await?;
    if !user.is_active {
        log::warn!("Login attempt for inactive user {}", user.id);
        return Ok(rejected(&req));
    }

    let cookie = sessions.issue_cookie(&AuthUser::from(&user))?;
    log::info!("User {} logged in", user.id);

    let mut response = flash::redirect(DASHBOARD_PATH, FlashMessage::success("Login successful!"));
    response.cookie(cookie);
    Ok(response.finish())
}

/// Finds the row for the provider subject, creating it when the provider
/// knows the account but the datastore does not, and stores the new tokens.
pub async fn resolve_user(
    users: &dyn UserRepository,
    session: ProviderSession,
) -> Result<User, RepositoryError> {
    let mut user = match users
        .get_user_by_cognito_sub(&session.identity.subject)
        .await?
    {
        Some(user) => user,
        None => {
            let user = User::new(session.identity.subject, session.identity.email);
            users.create_user(&user).await?;
            log::info!("Created user {} on first login", user.id);
            user
        }
    };

    user.cognito_access_token = Some(session.access_token);
    user.cognito_refresh_token = session.refresh_token;
    user.update_last_login();
    users.update_user(&user).await?;
    Ok(user)
}

pub async fn logout(
    user: AuthenticatedUser,
    identity: web::Data<dyn IdentityProvider>,
    users: web::Data<dyn UserRepository>,
    sessions: web::Data<SessionManager>,
) -> HttpResponse {
    let AuthenticatedUser(auth_user) = user;

    match users.get_user_by_id(auth_user.id).await {
        Ok(Some(mut stored)) => {
            if let Some(token) = stored.cognito_access_token.as_deref() {
                if let Err(e) = identity.sign_out(token).await {
                    log::warn!("Provider sign-out failed for {}: {}", auth_user.id, e);
                }
            }
            stored.clear_tokens();
            if let Err(e) = users.update_user(&stored).await {
                log::warn!("Failed to clear tokens for {}: {}", auth_user.id, e);
            }
        }
        Ok(None) => log::warn!("Logout for unknown user {}", auth_user.id),
        Err(e) => log::error!("Failed to load user {} on logout: {}", auth_user.id, e),
    }

    log::info!("User {} logged out", auth_user.id);
    let mut response = flash::redirect("/", FlashMessage::success("You have been logged out."));
    response.cookie(sessions.removal_cookie());
    response.finish()
}
