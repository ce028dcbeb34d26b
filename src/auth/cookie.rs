//! Refresh cookie handling.
//!
//! The refresh token only ever travels in this cookie. Clearing it must
//! repeat every attribute used when it was set, otherwise browsers keep it.

use axum::http::{HeaderMap, HeaderValue, header};

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "jwt";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// SameSite attribute of the refresh cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SameSite {
    /// Cross-site requests carry the cookie (front end on another origin)
    None,
    /// Same-site requests only
    Strict,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::None => "None",
            SameSite::Strict => "Strict",
        }
    }
}

/// Attributes shared by every refresh cookie this server sets or clears.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSite::None,
        }
    }
}

impl CookiePolicy {
    fn attributes(&self) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("HttpOnly; SameSite={}; Path=/{}", self.same_site.as_str(), secure)
    }

    /// Set-Cookie value carrying a refresh token. `max_age_secs` should be
    /// the refresh token lifetime.
    pub fn refresh_cookie(&self, token: &str, max_age_secs: u64) -> String {
        format!(
            "{}={}; {}; Max-Age={}",
            REFRESH_COOKIE_NAME,
            token,
            self.attributes(),
            max_age_secs
        )
    }

    /// Set-Cookie value that removes the refresh cookie.
    pub fn clear_refresh_cookie(&self) -> String {
        format!("{}=; {}; Max-Age=0", REFRESH_COOKIE_NAME, self.attributes())
    }

    /// `refresh_cookie` as a header value.
    pub fn refresh_header(&self, token: &str, max_age_secs: u64) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.refresh_cookie(token, max_age_secs)).ok()
    }

    /// `clear_refresh_cookie` as a header value.
    pub fn clear_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.clear_refresh_cookie()).ok()
    }
}
