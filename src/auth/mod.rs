//! Stateless JWT authentication with role-based access control.
//!
//! Dual-token system: a short-lived access token returned in the response
//! body and sent back as a bearer header, and a longer-lived refresh token
//! carried only in the httpOnly `jwt` cookie. Neither is stored server-side.

mod cookie;
mod credentials;
mod errors;
mod extractors;
mod ip;
mod policy;
mod state;
mod types;
mod verify;

pub use cookie::{CookiePolicy, REFRESH_COOKIE_NAME, SameSite, get_cookie};
pub use credentials::{require_fields, verify};
pub use errors::AuthError;
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use ip::{ClientIpHeader, extract_client_ip};
pub use policy::{Rule, authorize};
pub use state::HasAuthBackend;
pub use types::Identity;
pub use verify::{bearer_token, refresh_cookie_token, verify_bearer, verify_refresh_cookie};
