pub mod cognito_service;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod provider;
pub mod routes;
pub mod session;

pub use middleware::{AuthenticatedUser, SessionGate};
pub use provider::{IdentityError, IdentityProvider, ProviderIdentity, ProviderSession};
pub use session::SessionManager;
