/// Middleware module
///
/// Access-token guard for protected routes and per-request logging.

mod auth_guard;
mod request_logger;

pub use auth_guard::{authenticate, bearer_token, AuthGuard, CurrentUser, ACCESS_TOKEN_COOKIE};
pub use request_logger::RequestLogger;
