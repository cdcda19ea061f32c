//! HTTP middleware for the storefront and admin servers.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{
    AuthRejection, BackendState, CurrentUser, OptionalAuth, RequireAuth, clear_stored_auth,
    set_stored_auth,
};
pub use request_id::request_id_middleware;
pub use session::{SessionLayer, create_session_layer};
