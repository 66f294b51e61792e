use super::RateLimiter;
use crate::types::Result;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

static LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// State for one rate-limited route.
#[derive(Clone)]
pub struct RouteLimit {
    pub limiter: RateLimiter,
    pub route: &'static str,
    pub trust_forwarded_for: bool,
}

impl RouteLimit {
    pub fn new(limiter: RateLimiter, route: &'static str, trust_forwarded_for: bool) -> Self {
        Self {
            limiter,
            route,
            trust_forwarded_for,
        }
    }
}

/// Identifies the caller for rate limiting.
///
/// Uses the first `X-Forwarded-For` entry only when the deployment sits
/// behind a trusted proxy, then the peer address, then `"unknown"`.
pub fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware applied per route with `middleware::from_fn_with_state`.
pub async fn enforce_rate_limit(
    State(limit): State<RouteLimit>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let client = client_key(&request, limit.trust_forwarded_for);

    let decision = limit
        .limiter
        .check(limit.route, &client)
        .await
        .inspect_err(|e| {
            tracing::warn!(
                route = limit.route,
                client = %client,
                error = %e,
                "Rate limit exceeded"
            );
        })?;

    let mut response = next.run(request).await;

    if let Some(decision) = decision {
        let headers = response.headers_mut();
        headers.insert(LIMIT_HEADER.clone(), HeaderValue::from(decision.limit));
        headers.insert(
            REMAINING_HEADER.clone(),
            HeaderValue::from(decision.remaining),
        );
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateRule;
    use axum::{
        body::Body,
        http::{header, StatusCode},
        routing::get,
        Router,
    };
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    fn request_with(forwarded: Option<&str>, peer: Option<SocketAddr>) -> Request {
        let mut builder = Request::builder().uri("/login/access-token");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(addr) = peer {
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    #[test]
    fn test_client_key_prefers_peer_when_proxy_untrusted() {
        let peer: SocketAddr = "192.168.1.7:51000".parse().unwrap();
        let request = request_with(Some("203.0.113.9"), Some(peer));

        assert_eq!(client_key(&request, false), "192.168.1.7");
    }

    #[test]
    fn test_client_key_uses_first_forwarded_entry() {
        let peer: SocketAddr = "10.0.0.2:443".parse().unwrap();
        let request = request_with(Some("203.0.113.9, 10.0.0.1"), Some(peer));

        assert_eq!(client_key(&request, true), "203.0.113.9");
    }

    #[test]
    fn test_client_key_falls_back_to_unknown() {
        let request = request_with(None, None);

        assert_eq!(client_key(&request, true), "unknown");
    }

    #[tokio::test]
    async fn test_layer_limits_each_peer_separately() {
        let limiter = RateLimiter::in_memory(HashMap::from([(
            "login".to_string(),
            RateRule::new(1, Duration::from_secs(60)),
        )]));
        let app = Router::new().route(
            "/login/access-token",
            get(|| async { "ok" }).layer(axum::middleware::from_fn_with_state(
                RouteLimit::new(limiter, "login", false),
                enforce_rate_limit,
            )),
        );
        let alice: SocketAddr = "198.51.100.1:40000".parse().unwrap();
        let bob: SocketAddr = "198.51.100.2:40000".parse().unwrap();

        let first = app.clone().oneshot(request_with(None, Some(alice))).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "1");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "0");

        let second = app.clone().oneshot(request_with(None, Some(alice))).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(header::RETRY_AFTER));

        let other = app.oneshot(request_with(None, Some(bob))).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }
}
