//! Per-client rate limiting using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for login, registration and password reset
//! - `api_rate_limiter`: relaxed limits for everything else
//!
//! Clients are keyed by the socket peer address. `X-Forwarded-For` and
//! `X-Real-IP` are only read when `TRUST_PROXY_HEADERS` is set, since any
//! client can send them.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::{request::Parts, Extensions, HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

use crate::state::AppState;

/// Client IP key for the limiters
#[derive(Debug, Clone, Copy)]
pub struct ClientIpKeyExtractor {
    pub trust_proxy_headers: bool,
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req, self.trust_proxy_headers).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Client address: the connection's peer address, or with
/// `trust_proxy_headers` the first `X-Forwarded-For` hop, then `X-Real-IP`
pub fn client_ip<T>(req: &Request<T>, trust_proxy_headers: bool) -> Option<IpAddr> {
    peer_ip(req.headers(), req.extensions(), trust_proxy_headers)
}

fn peer_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return Some(ip);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Client address as seen by [`client_ip`]; loopback when unknown
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust = AppState::from_ref(state).config.trust_proxy_headers;
        let ip = peer_ip(&parts.headers, &parts.extensions, trust)
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Ok(ClientIp(ip))
    }
}

pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_seconds: u64, burst: u32, trust_proxy_headers: bool) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor { trust_proxy_headers })
        .per_second(replenish_seconds)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// ~10 requests per minute per IP with a burst of 5
pub fn auth_rate_limiter(trust_proxy_headers: bool) -> Option<RateLimiterLayer> {
    limiter(6, 5, trust_proxy_headers)
}

/// ~100 requests per minute per IP with a burst of 50
pub fn api_rate_limiter(trust_proxy_headers: bool) -> Option<RateLimiterLayer> {
    limiter(1, 50, trust_proxy_headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn forwarded_request() -> Request<Body> {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        req
    }

    #[test]
    fn proxy_headers_are_ignored_by_default() {
        let req = forwarded_request();
        assert_eq!(client_ip(&req, false), Some("192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn forwarded_for_wins_behind_a_trusted_proxy() {
        let req = forwarded_request();
        assert_eq!(client_ip(&req, true), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn real_ip_is_used_without_forwarded_for() {
        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, true), Some("198.51.100.2".parse().unwrap()));
        assert_eq!(client_ip(&req, false), None);
    }

    #[test]
    fn falls_back_to_peer_address() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "not an address")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_ip(&req, true), Some("192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn limiters_build() {
        assert!(auth_rate_limiter(false).is_some());
        assert!(api_rate_limiter(true).is_some());
    }
}
