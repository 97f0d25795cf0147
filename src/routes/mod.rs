//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod identity;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/quests/request", post(http::http_request_quest))
        .route("/api/v1/quests/submit", post(http::http_submit_answer))
        .route("/api/v1/quests/refill-via-ad", post(http::http_refill_via_ad))
        .route("/api/v1/quests/subscription", get(http::http_subscription_status))
        .route("/api/v1/quests/:id", get(http::http_get_quest))
        .route("/api/v1/llm/generate", post(http::http_generate_preview))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::generator::offline::OfflineGenerator;
    use crate::store::MemoryStore;

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.session.auto_provision_users = true;
        let state = AppState::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(OfflineGenerator::default()));
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req.header(identity::USER_ID_HEADER, user);
        }
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_provider() {
        let (status, body) = call(&app(), "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "provider": "offline"}));
    }

    #[tokio::test]
    async fn quest_routes_require_a_caller() {
        let (status, body) =
            call(&app(), "POST", "/api/v1/quests/request", None, Some(json!({"subject": "math"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn request_then_submit_round_trip() {
        let app = app();
        let (status, body) =
            call(&app, "POST", "/api/v1/quests/request", Some("u1"), Some(json!({"subject": "math"}))).await;
        assert_eq!(status, StatusCode::OK);
        let quest_id = body["quest"]["id"].as_str().unwrap().to_string();
        assert!(body["quest"].get("correctAnswer").is_none());
        assert_eq!(body["quest"]["difficulty"], 1);

        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/quests/submit",
            Some("u1"),
            Some(json!({"questId": quest_id, "answer": " 42 ", "explanation": "six sevens are forty-two"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 100);
        assert_eq!(body["solved"], true);
        assert_eq!(body["nextDifficulty"], 2);

        let (status, body) = call(&app, "GET", &format!("/api/v1/quests/{quest_id}"), Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quest"]["correctAnswer"], "42");

        let (status, _) = call(&app, "GET", &format!("/api/v1/quests/{quest_id}"), Some("u2"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ad_refill_then_quota_exhaustion() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/v1/quests/refill-via-ad", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "remaining": 4}));

        let (status, body) = call(&app, "GET", "/api/v1/quests/subscription", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"isSubscribed": false}));

        // Five free slots plus the four ad slots left.
        for _ in 0..9 {
            let (status, _) =
                call(&app, "POST", "/api/v1/quests/request", Some("u1"), Some(json!({"subject": "math"}))).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) =
            call(&app, "POST", "/api/v1/quests/request", Some("u1"), Some(json!({"subject": "math"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "quota_exceeded");

        let (status, body) = call(&app, "POST", "/api/v1/quests/refill-via-ad", Some("u1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "limit_reached");
    }

    #[tokio::test]
    async fn unknown_quest_is_not_found() {
        let (status, body) = call(&app(), "GET", "/api/v1/quests/nope", Some("u1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}
