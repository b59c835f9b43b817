//! HTTP server startup and router assembly

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::Config,
    shared_state::{AppState, ServiceContext},
};

/// Open the stores, wire the router and serve until ctrl-c
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::metrics::init_metrics();
    cfg.print_config();

    let ctx = ServiceContext::from_config(&cfg)?;
    let addr = cfg.api_addr()?;
    let state = AppState::new(ctx, Arc::new(cfg));

    let limiter = state.rate_limiter.clone();
    let prune_every = state.config.rate_limit_window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(prune_every);
        loop {
            ticker.tick().await;
            limiter.prune();
        }
    });

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = build_router(state);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

pub fn build_router(state: AppState) -> Router {
    use crate::api;
    use axum::routing::post;

    let cors = cors_layer(&state.config.cors_origins);

    let limited = Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/api/v1/chat/:user_id", post(api::chat))
        .route("/api/v1/history/:user_id", get(api::get_history).delete(api::clear_history))
        .route(
            "/api/v1/profile/:user_id",
            get(api::get_profile).put(api::update_profile).delete(api::delete_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::rate_limit::rate_limit_middleware,
        ));

    // /metrics stays outside the rate limiter
    Router::new()
        .merge(limited)
        .route("/metrics", get(crate::metrics::get_metrics))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` allows any origin without credentials; an explicit list allows credentials
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;
    crate::metrics::inc_request(&route, response.status().as_str());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::test_support::{Harness, StubInference};
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(harness: &Harness, extra: &[(&str, &str)]) -> Router {
        let mut vars: Vec<(&str, &str)> = vec![("GROQ_API_KEY", "test-key")];
        vars.extend_from_slice(extra);
        let config = Config::from_lookup(|key| {
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
        })
        .unwrap();
        build_router(AppState::new(harness.ctx.clone(), Arc::new(config)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_chat_then_history_returns_assistant_row() {
        let harness = Harness::new(StubInference::replying("Let's breathe together."));
        let app = app_with(&harness, &[]);

        let (status, reply) = send(&app, "POST", "/api/v1/chat/1", Some(json!({"message": "I feel stressed"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["reply"], "Let's breathe together.");
        let timestamp = reply["timestamp"].as_str().unwrap().to_string();

        let (status, history) = send(&app, "GET", "/api/v1/history/1?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["user_id"], 1);
        assert_eq!(history["total_count"], 1);
        let item = &history["items"][0];
        assert_eq!(item["role"], "assistant");
        assert_eq!(item["content"], "Let's breathe together.");
        assert!(item["timestamp"].as_str().unwrap().starts_with(&format!("{}#assistant#", timestamp)));
    }

    #[tokio::test]
    async fn test_error_bodies_and_statuses() {
        let harness = Harness::new(StubInference::replying("ok"));
        let app = app_with(&harness, &[]);

        let (status, body) = send(&app, "GET", "/api/v1/history/1?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["detail"], "limit must be between 1 and 100");
        assert!(body["timestamp"].is_string());

        let (status, body) = send(&app, "POST", "/api/v1/chat/0", Some(json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "user_id must be a positive integer");

        let (status, body) = send(&app, "DELETE", "/api/v1/history/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No conversation history found for user_id: 9");
    }

    #[tokio::test]
    async fn test_inference_failure_is_500() {
        let harness = Harness::new(StubInference::failing());
        let app = app_with(&harness, &[]);
        let (status, body) = send(&app, "POST", "/api/v1/chat/1", Some(json!({"message": "hello"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("AI generation failed:"));
    }

    #[tokio::test]
    async fn test_profile_lifecycle_over_http() {
        let harness = Harness::new(StubInference::replying("ok"));
        let app = app_with(&harness, &[]);

        let (status, body) = send(&app, "GET", "/api/v1/profile/3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["background"], "Other");
        assert_eq!(body["age"], Value::Null);

        let (status, body) = send(&app, "PUT", "/api/v1/profile/3", Some(json!({"age": 28, "preferences": {"yoga": true}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Profile created successfully");

        let (status, body) = send(&app, "PUT", "/api/v1/profile/3", Some(json!({"age": 200}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid profile"));

        let (_, body) = send(&app, "GET", "/api/v1/profile/3", None).await;
        assert_eq!(body["age"], 28);
        assert_eq!(body["preferences"]["yoga"], true);

        let (status, _) = send(&app, "DELETE", "/api/v1/profile/3", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "DELETE", "/api/v1/profile/3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_history_response_shape() {
        let harness = Harness::new(StubInference::replying("ok"));
        let app = app_with(&harness, &[]);
        send(&app, "POST", "/api/v1/chat/2", Some(json!({"message": "trouble with sleep"}))).await;

        let (status, body) = send(&app, "DELETE", "/api/v1/history/2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["deleted_count"], 2);
        assert_eq!(body["message"], "Cleared 2 messages and saved conversation summary");
        assert_eq!(body["summary"]["message_count"], 2);
        assert_eq!(body["summary"]["key_topics"], json!(["sleep"]));
    }

    #[tokio::test]
    async fn test_rate_limit_exempts_metrics() {
        crate::metrics::init_metrics();
        let harness = Harness::new(StubInference::replying("ok"));
        let app = app_with(&harness, &[("RATE_LIMIT_REQUESTS", "2")]);

        assert_eq!(send(&app, "GET", "/", None).await.0, StatusCode::OK);
        assert_eq!(send(&app, "GET", "/health", None).await.0, StatusCode::OK);
        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded");

        let response = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_store_ping() {
        let harness = Harness::new(StubInference::replying("ok"));
        let app = app_with(&harness, &[]);
        let (_, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "connected");

        let (_, body) = send(&app, "GET", "/", None).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_cors_layer_accepts_lists_and_wildcard() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\nvalue".to_string()]);
    }
}
