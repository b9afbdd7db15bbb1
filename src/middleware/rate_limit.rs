//! In-memory sliding-window limiter. Keyed by caller id, or by peer address
//! for requests that carry none.
use crate::web::identity::USER_HEADER;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, 60)
    }

    /// Records the request and reports whether it fits in the window.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let history = requests.entry(identifier.to_string()).or_default();
        history.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }

    /// Drops identifiers with no requests left in the window.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, history| {
            history.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !history.is_empty()
        });

        tracing::debug!(
            "Rate limiter cleanup: {} active identifiers",
            requests.len()
        );
    }
}

fn caller_key(request: &Request<Body>, peer: Option<SocketAddr>) -> String {
    let user = request
        .headers()
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (user, peer) {
        (Some(user), _) => format!("user:{user}"),
        (None, Some(addr)) => format!("ip:{}", addr.ip()),
        (None, None) => "anonymous".to_string(),
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = caller_key(&request, peer.map(|ConnectInfo(addr)| addr));

    if !limiter.check(&key).await {
        tracing::warn!("Rate limit exceeded for {}", key);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("user:a").await);
        assert!(limiter.check("user:a").await);
        assert!(limiter.check("user:a").await);
        assert!(!limiter.check("user:a").await);

        assert!(limiter.check("user:b").await);
    }

    #[tokio::test]
    async fn test_cleanup() {
        let limiter = RateLimiter::new(5, 1);

        limiter.check("ip:10.0.0.1").await;
        limiter.check("ip:10.0.0.2").await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        limiter.cleanup().await;

        let requests = limiter.requests.read().await;
        assert_eq!(requests.len(), 0);
    }

    #[test]
    fn caller_header_wins_over_peer_address() {
        let peer: SocketAddr = "192.168.1.4:5000".parse().unwrap();
        let with_user = Request::builder()
            .header(USER_HEADER, " 5d1c7f3e-3b1a-4a53-9b84-0c1f1d2e3a4b ")
            .body(Body::empty())
            .unwrap();
        let without = Request::builder().body(Body::empty()).unwrap();

        assert_eq!(
            caller_key(&with_user, Some(peer)),
            "user:5d1c7f3e-3b1a-4a53-9b84-0c1f1d2e3a4b"
        );
        assert_eq!(caller_key(&without, Some(peer)), "ip:192.168.1.4");
        assert_eq!(caller_key(&without, None), "anonymous");
    }

    #[tokio::test]
    async fn middleware_returns_429_past_the_limit() {
        let limiter = RateLimiter::new(1, 60);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));

        let request = || {
            Request::builder()
                .uri("/")
                .header(USER_HEADER, "caller")
                .body(Body::empty())
                .unwrap()
        };
        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
