//! Identity, credential, and session primitives for Solobase (C6).
//!
//! - [`password`] hashes and verifies Argon2id credentials.
//! - [`jwt`] issues and verifies HS256 bearer tokens.
//! - [`session`] builds hardened session cookies and validates
//!   post-login redirect targets.
//! - [`service`] ties the above to [`solobase_db::UserRepo`] for
//!   registration and login.

mod error;
mod jwt;
mod password;
mod service;
mod session;


pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, TokenIssuer};
pub use password::{hash_password, verify_password};
pub use service::AuthService;
pub use session::{build_session_cookie, clear_session_cookie, validate_redirect_target, SESSION_COOKIE_NAME};
