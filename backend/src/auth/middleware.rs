use super::models::AuthUser;
use super::session::SessionManager;
use crate::flash::{self, FlashMessage};
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use actix_web::{FromRequest, HttpRequest};
use futures::future::{Ready, ok, ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/login";

/// Guards a resource: requests without a valid session are redirected to
/// the login view before the wrapped handler runs.
#[derive(Clone)]
pub struct SessionGate {
    sessions: Arc<SessionManager>,
}

impl SessionGate {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions: Arc::new(sessions),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = SessionGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionGateService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
        })
    }
}

pub struct SessionGateService<S> {
    service: Rc<S>,
    sessions: Arc<SessionManager>,
}

impl<S, B> Service<ServiceRequest> for SessionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let sessions = self.sessions.clone();

        Box::pin(async move {
            match sessions.authenticate(req.request()) {
                Ok(user) => {
                    log::debug!("Session accepted for {} on {}", user.id, req.path());
                    req.extensions_mut().insert(user);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(session_error) => {
                    log::warn!("{}", session_error.log_message(req.path()));

                    let mut response = flash::redirect(
                        LOGIN_PATH,
                        FlashMessage::info("Please log in to access this page."),
                    );
                    if session_error.is_stale() {
                        response.cookie(sessions.removal_cookie());
                    }

                    let (http_req, _payload) = req.into_parts();
                    let response = response.finish().map_into_right_body();
                    Ok(ServiceResponse::new(http_req, response))
                }
            }
        })
    }
}

/// Extractor for the caller resolved by [`SessionGate`].
pub struct AuthenticatedUser(pub AuthUser);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ok(AuthenticatedUser(user.clone())),
            None => {
                log::error!(
                    "AuthenticatedUser requested on {} without a session gate",
                    req.path()
                );
                ready(Err(actix_web::error::ErrorUnauthorized("not authenticated")))
            }
        }
    }
}
