//! Client IP extraction for per-client rate limiting.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

/// Header set by a trusted reverse proxy that carries the client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `X-Forwarded-For`, leftmost entry
    XForwardedFor,
    /// `X-Real-IP`
    XRealIp,
}

impl ClientIpHeader {
    fn header_name(&self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        }
    }

    fn parse(&self, value: &str) -> Option<String> {
        let candidate = match self {
            ClientIpHeader::XForwardedFor => value.split(',').next()?,
            ClientIpHeader::XRealIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .ok()
            .map(|ip| ip.to_string())
    }
}

/// Extract the client IP.
///
/// With a proxy header configured only that header is trusted; there is no
/// fallback to the socket address. Without one the peer address from
/// `ConnectInfo` is used.
pub fn extract_client_ip<B>(
    request: &Request<B>,
    ip_header: Option<ClientIpHeader>,
) -> Option<String> {
    match ip_header {
        Some(header) => {
            let value = request.headers().get(header.header_name())?.to_str().ok()?;
            header.parse(value)
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string()),
    }
}
