//! JWT token generation and validation.
//!
//! Access and refresh tokens carry the same claim set but are signed with
//! independent secrets and expire after independent lifetimes.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default access token lifetime: 10 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 10 * 60;

/// Default refresh token lifetime: 1 day.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer token returned in the response body
    Access,
    /// Longer-lived token carried only in the httpOnly session cookie
    Refresh,
}

/// Claims embedded in both access and refresh tokens.
///
/// The claims are a snapshot of the user at issuance time. `sub` pins the
/// token to one user row, so a later account with the same name never
/// inherits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Unique per issuance so two tokens minted in the same second differ
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Lifetime in seconds
    pub duration: u64,
    pub expires_at: u64,
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("{0} token secret is missing or empty")]
    MissingSecret(TokenType),
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("System time error")]
    TimeError,
    #[error("Wrong token type")]
    WrongTokenType,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// Signing and verification keys derived from one secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Sign a token for the user with the given keys and lifetime.
pub fn issue(
    user_id: i64,
    username: &str,
    is_admin: bool,
    token_type: TokenType,
    keys: &TokenKeys,
    lifetime_secs: u64,
) -> Result<IssuedToken, JwtError> {
    let now = now_secs()?;
    let exp = now + lifetime_secs;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        is_admin,
        token_type,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp,
    };

    let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding_key)
        .map_err(JwtError::Encoding)?;

    Ok(IssuedToken {
        token,
        duration: lifetime_secs,
        expires_at: exp,
    })
}

/// Check signature and expiry (no leeway) and the expected token type.
pub fn validate(token: &str, token_type: TokenType, keys: &TokenKeys) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = jsonwebtoken::decode::<Claims>(token, &keys.decoding_key, &validation)
        .map_err(JwtError::Decoding)?;

    if token_data.claims.token_type != token_type {
        return Err(JwtError::WrongTokenType);
    }

    Ok(token_data.claims)
}

/// Access/refresh lifetimes in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access_secs: u64,
    pub refresh_secs: u64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
        }
    }
}

/// Process-wide token configuration, built once at startup.
#[derive(Clone)]
pub struct JwtConfig {
    access: TokenKeys,
    refresh: TokenKeys,
    lifetimes: TokenLifetimes,
}

impl JwtConfig {
    /// Build the configuration. Empty secrets are rejected so the server
    /// never runs with a token kind it cannot sign.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        lifetimes: TokenLifetimes,
    ) -> Result<Self, JwtError> {
        if access_secret.is_empty() {
            return Err(JwtError::MissingSecret(TokenType::Access));
        }
        if refresh_secret.is_empty() {
            return Err(JwtError::MissingSecret(TokenType::Refresh));
        }

        Ok(Self {
            access: TokenKeys::new(access_secret),
            refresh: TokenKeys::new(refresh_secret),
            lifetimes,
        })
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    pub fn generate_access_token(
        &self,
        user_id: i64,
        username: &str,
        is_admin: bool,
    ) -> Result<IssuedToken, JwtError> {
        issue(
            user_id,
            username,
            is_admin,
            TokenType::Access,
            &self.access,
            self.lifetimes.access_secs,
        )
    }

    pub fn generate_refresh_token(
        &self,
        user_id: i64,
        username: &str,
        is_admin: bool,
    ) -> Result<IssuedToken, JwtError> {
        issue(
            user_id,
            username,
            is_admin,
            TokenType::Refresh,
            &self.refresh,
            self.lifetimes.refresh_secs,
        )
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        validate(token, TokenType::Access, &self.access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        validate(token, TokenType::Refresh, &self.refresh)
    }
}
