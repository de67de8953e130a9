//! Per-client rate limiting applied to every route.
//!
//! Clients are keyed by peer IP (from axum's `ConnectInfo`). When
//! `rate_limit.trust_forwarded_headers` is set, the first `X-Forwarded-For`
//! entry or `X-Real-IP` takes precedence, for deployments behind a proxy.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use chatgate_core::RateLimiter;

use crate::error::AppError;

const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct RateLimitGate {
    limiter: Arc<RateLimiter>,
    trust_forwarded: bool,
}

impl RateLimitGate {
    pub fn new(limiter: Arc<RateLimiter>, trust_forwarded: bool) -> Self {
        Self {
            limiter,
            trust_forwarded,
        }
    }
}

pub fn client_key(req: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let forwarded = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header("x-real-ip"));
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub async fn rate_limit(
    State(gate): State<RateLimitGate>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&req, gate.trust_forwarded);

    if let Err(e) = gate.limiter.check(&key) {
        tracing::warn!("Rate limited {key} on {}", req.uri().path());
        return Err(e.into());
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(peer: Option<&str>, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/health");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn keys_by_peer_ip_without_port() {
        let req = request_from(Some("192.168.1.20:51234"), &[]);
        assert_eq!(client_key(&req, false), "192.168.1.20");
    }

    #[test]
    fn ignores_forwarded_headers_unless_trusted() {
        let req = request_from(Some("10.0.0.1:4000"), &[("x-forwarded-for", "203.0.113.9")]);
        assert_eq!(client_key(&req, false), "10.0.0.1");
        assert_eq!(client_key(&req, true), "203.0.113.9");
    }

    #[test]
    fn uses_first_forwarded_hop_then_real_ip() {
        let req = request_from(
            Some("10.0.0.1:4000"),
            &[("x-forwarded-for", " 198.51.100.4 , 10.0.0.2")],
        );
        assert_eq!(client_key(&req, true), "198.51.100.4");

        let req = request_from(Some("10.0.0.1:4000"), &[("x-real-ip", "198.51.100.5")]);
        assert_eq!(client_key(&req, true), "198.51.100.5");
    }

    #[test]
    fn empty_first_forwarded_hop_falls_through_to_real_ip() {
        let req = request_from(
            Some("10.0.0.1:4000"),
            &[("x-forwarded-for", ", 1.2.3.4"), ("x-real-ip", "198.51.100.6")],
        );
        assert_eq!(client_key(&req, true), "198.51.100.6");

        let req = request_from(Some("10.0.0.1:4000"), &[("x-forwarded-for", " , 1.2.3.4")]);
        assert_eq!(client_key(&req, true), "10.0.0.1");
    }

    #[test]
    fn missing_peer_falls_back_to_unknown() {
        let req = request_from(None, &[]);
        assert_eq!(client_key(&req, true), UNKNOWN_CLIENT);
    }
}
