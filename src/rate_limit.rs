//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::ApiError;
use crate::auth::{ClientIpHeader, extract_client_ip};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default login attempts per minute per client.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Default registrations per minute per client.
pub const DEFAULT_SIGNUP_PER_MINUTE: u32 = 3;

/// Clients whose address cannot be determined share one bucket.
const UNKNOWN_CLIENT: &str = "unknown";

/// Configured request allowances.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub login_per_minute: u32,
    pub signup_per_minute: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login_per_minute: DEFAULT_LOGIN_PER_MINUTE,
            signup_per_minute: DEFAULT_SIGNUP_PER_MINUTE,
        }
    }
}

/// Rate limiters shared by the authentication routes.
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts
    pub login: IpLimiter,
    /// Per-IP limiter for user registration
    pub signup: IpLimiter,
    /// Proxy header to read the client address from, if any
    pub ip_header: Option<ClientIpHeader>,
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

impl RateLimitConfig {
    pub fn new(limits: RateLimits, ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            login: RateLimiter::keyed(per_minute(limits.login_per_minute)),
            signup: RateLimiter::keyed(per_minute(limits.signup_per_minute)),
            ip_header,
        }
    }

    fn client_key(&self, request: &Request) -> String {
        extract_client_ip(request, self.ip_header).unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = config.client_key(&request);

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            ApiError::too_many_requests(
                "Too many login attempts. Please wait before trying again.",
            )
            .into_response()
        }
    }
}

/// Middleware for rate limiting user registration.
pub async fn rate_limit_signup(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = config.client_key(&request);

    match config.signup.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Signup rate limit exceeded");
            ApiError::too_many_requests("Too many signup attempts. Please wait before trying again.")
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_buckets_are_independent() {
        let config = RateLimitConfig::new(
            RateLimits {
                login_per_minute: 2,
                signup_per_minute: 1,
            },
            None,
        );
        let a = "192.0.2.1".to_string();
        let b = "192.0.2.2".to_string();

        assert!(config.login.check_key(&a).is_ok());
        assert!(config.login.check_key(&a).is_ok());
        assert!(config.login.check_key(&a).is_err());
        assert!(config.login.check_key(&b).is_ok());

        assert!(config.signup.check_key(&a).is_ok());
        assert!(config.signup.check_key(&a).is_err());
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let config = RateLimitConfig::new(
            RateLimits {
                login_per_minute: 0,
                signup_per_minute: 0,
            },
            None,
        );
        assert!(config.login.check_key(&"x".to_string()).is_ok());
    }
}
