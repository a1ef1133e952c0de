//! Visitor metadata for click logging.
//!
//! Forwarded headers are only believed when the socket peer is a proxy:
//!
//! 1. `TRUSTED_PROXIES` set and the peer matches → forwarded IP
//! 2. `TRUSTED_PROXIES` set and the peer does not match → peer IP
//! 3. `TRUSTED_PROXIES` unset and the peer is private or loopback → forwarded IP
//! 4. Otherwise → peer IP

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::USER_AGENT, request::Parts},
};

use crate::services::tags::Visitor;
use crate::state::AppState;

const MAX_USER_AGENT_LEN: usize = 512;

/// Client IP and user agent of the current request.
pub struct ClientInfo(pub Visitor);

impl FromRequestParts<AppState> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(Visitor {
            ip: client_ip(peer, &parts.headers, &state.config().trusted_proxies),
            user_agent: user_agent(&parts.headers),
        }))
    }
}

/// Resolve the client IP from the peer address and forwarded headers.
fn client_ip(peer: Option<IpAddr>, headers: &HeaderMap, trusted_proxies: &[String]) -> Option<String> {
    let peer = peer?;

    let behind_proxy = if trusted_proxies.is_empty() {
        is_private_or_local(&peer)
    } else {
        is_trusted_proxy(&peer, trusted_proxies)
    };

    if behind_proxy && let Some(forwarded) = forwarded_ip(headers) {
        tracing::debug!(peer = %peer, client = %forwarded, "Using forwarded client IP");
        return Some(forwarded);
    }

    Some(peer.to_string())
}

/// Private, loopback, IPv6 unique-local or link-local address.
fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            let first = v6.segments().first().copied().unwrap_or_default();
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

fn is_trusted_proxy(ip: &IpAddr, trusted_proxies: &[String]) -> bool {
    trusted_proxies.iter().any(|entry| match entry.split_once('/') {
        Some((network, prefix)) => ip_in_cidr(ip, network, prefix),
        None => entry.parse::<IpAddr>().is_ok_and(|proxy| proxy == *ip),
    })
}

fn ip_in_cidr(ip: &IpAddr, network: &str, prefix: &str) -> bool {
    let (Ok(network), Ok(prefix)) = (network.parse::<IpAddr>(), prefix.parse::<u32>()) else {
        return false;
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .map(String::from)
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect())
}
