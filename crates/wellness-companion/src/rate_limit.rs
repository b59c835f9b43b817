//! Per-client fixed-window request limiting for the API routes

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use tracing::warn;

use crate::shared_state::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client key; the window resets once it has elapsed
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    clients: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, clients: DashMap::new() }
    }

    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert(Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    pub fn limit_description(&self) -> String {
        format!("{} per {} seconds", self.max_requests, self.window.as_secs())
    }

    /// Drop windows that have already expired
    pub fn prune(&self) {
        let now = Instant::now();
        self.clients.retain(|_, w| now.duration_since(w.started) < self.window);
    }
}

fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    forwarded_for(request.headers()).unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    if !state.rate_limiter.check(&client) {
        warn!("Rate limit exceeded for client {}", client);
        let body = Json(json!({
            "error": "Rate limit exceeded",
            "detail": format!("Rate limit exceeded: {}", state.rate_limiter.limit_description()),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));
        return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    }
    next.run(request).await
}
