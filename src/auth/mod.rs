/// Authentication module
///
/// Password hashing, JWT issuance/validation, refresh-token session
/// tracking and the service that ties them together.

mod claims;
mod jwt;
mod password;
mod service;
pub mod session;

pub use claims::{AccessClaims, RefreshClaims};
pub use jwt::{TokenIssuer, TokenPair};
pub use password::{hash_password, hash_password_with_cost, verify_password};
pub use service::{AuthService, Registration, Session};
