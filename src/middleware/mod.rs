mod auth;
mod error_handler;

pub use auth::{AuthSession, SESSION_COOKIE, auth_middleware, session_cookie};
pub use error_handler::log_errors;
