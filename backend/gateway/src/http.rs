//! HTTP binding: one tool endpoint plus liveness, metrics, and a 404
//! fallback. CORS headers come from the configured allow-list; the origin
//! guard in [`crate::origin`] runs before every handler.

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::json;
use sysinfo::System;
use tracing::debug;

use vigil_core::envelope;

use crate::{origin, rpc, GatewayState};

/// Build the stateless-transport router.
pub fn build_router(state: GatewayState) -> Router {
    let cors = cors_layer(&state);
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(handle_health))
        .route("/health/detailed", get(handle_health_detailed))
        .route("/metrics", get(handle_metrics))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), origin::enforce))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(state: &GatewayState) -> tower_http::cors::CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

/// `POST /mcp`: one JSON-RPC tool invocation per call. Unexpected internal
/// faults additionally get a generic 500; everything else is carried in the
/// response body.
async fn handle_mcp(State(state): State<GatewayState>, body: String) -> impl IntoResponse {
    debug!(bytes = body.len(), "tool request received");
    let response = match rpc::parse_request(&body) {
        Ok(request) => rpc::dispatch(&state, request).await,
        Err(error_response) => {
            state.metrics.record_error();
            *error_response
        }
    };
    let status = match &response.error {
        Some(error) if error.code == rpc::INTERNAL_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    (status, Json(response))
}

/// `GET /health`: process status and uptime, with the metrics snapshot
/// when enabled.
async fn handle_health(State(state): State<GatewayState>) -> impl IntoResponse {
    if !state.config.enable_health_check {
        return (
            StatusCode::NOT_FOUND,
            Json(envelope::err("health check disabled")),
        );
    }
    let mut body = json!({
        "status": "ok",
        "service": "vigil",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.metrics.uptime_seconds(),
        "timestamp": Utc::now(),
    });
    if state.config.enable_metrics {
        body["metrics"] = serde_json::to_value(state.metrics.snapshot()).unwrap_or_default();
    }
    (StatusCode::OK, Json(body))
}

/// `GET /health/detailed`: adds the effective config and host/platform
/// figures.
async fn handle_health_detailed(State(state): State<GatewayState>) -> impl IntoResponse {
    if !state.config.enable_health_check {
        return (
            StatusCode::NOT_FOUND,
            Json(envelope::err("health check disabled")),
        );
    }
    let body = json!({
        "status": "ok",
        "service": "vigil",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.metrics.uptime_seconds(),
        "timestamp": Utc::now(),
        "metrics": state.metrics.snapshot(),
        "config": &*state.config,
        "host": {
            "os": System::name(),
            "os_version": System::os_version(),
            "hostname": System::host_name(),
            "arch": std::env::consts::ARCH,
        },
        "process": state.metrics.process_stats(),
    });
    (StatusCode::OK, Json(body))
}

/// `GET /metrics`: the snapshot, unconditionally.
async fn handle_metrics(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "metrics": state.metrics.snapshot(),
        "process": state.metrics.process_stats(),
        "timestamp": Utc::now(),
    }))
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(envelope::err("not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use vigil_broker::CaptureBroker;
    use vigil_config::Config;
    use vigil_core::{Metrics, ToolRegistry};
    use vigil_ocr::{OcrEngine, OcrPipeline, RawRecognition};
    use vigil_tools::{default_registry, ActivityLog};

    const PIXEL_PNG: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    struct BlankEngine;

    #[async_trait]
    impl OcrEngine for BlankEngine {
        fn name(&self) -> &str {
            "blank"
        }

        async fn recognize(
            &self,
            _image: &[u8],
            _languages: &[String],
        ) -> anyhow::Result<RawRecognition> {
            Ok(RawRecognition {
                text: String::new(),
                mean_confidence: 0.0,
            })
        }
    }

    struct Fixture {
        router: Router,
        activity_log: Arc<ActivityLog>,
        registry: Arc<ToolRegistry>,
    }

    fn fixture() -> Fixture {
        let pipeline = Arc::new(OcrPipeline::new(Arc::new(BlankEngine), vec!["eng".into()]));
        let activity_log = ActivityLog::new(100);
        let registry = Arc::new(default_registry(
            pipeline,
            CaptureBroker::new(),
            activity_log.clone(),
            Duration::from_millis(100),
        ));
        let state = GatewayState {
            tools: registry.clone(),
            metrics: Arc::new(Metrics::new()),
            config: Arc::new(Config {
                transport: vigil_config::TransportKind::Http,
                ..Config::default()
            }),
        };
        Fixture {
            router: build_router(state),
            activity_log,
            registry,
        }
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn tool_call_body(tool: &str, arguments: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments }
        })
        .to_string()
    }

    fn post_mcp(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn envelope_of(rpc_response: &Value) -> Value {
        let text = rpc_response["result"]["content"][0]["text"]
            .as_str()
            .unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn extract_text_on_pixel_png_succeeds_with_empty_text() {
        let fx = fixture();
        let body = tool_call_body(
            "extract_text",
            json!({ "imageData": format!("data:image/png;base64,{PIXEL_PNG}") }),
        );
        let response = fx.router.clone().oneshot(post_mcp(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let rpc_response = response_json(response).await;
        let envelope = envelope_of(&rpc_response);
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["text"], "");
        assert!(envelope["confidence"].as_f64().unwrap().is_finite());
    }

    #[tokio::test]
    async fn log_activity_defaults_optional_fields_to_zero() {
        let fx = fixture();
        let body = tool_call_body("log_activity", json!({ "description": "test" }));
        let response = fx.router.clone().oneshot(post_mcp(body)).await.unwrap();
        let rpc_response = response_json(response).await;

        let envelope = envelope_of(&rpc_response);
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["entry"]["confidence"], 0.0);
        assert_eq!(envelope["entry"]["screen_text_length"], 0);
        assert_eq!(envelope["entry"]["processing_time"], 0);
        assert_eq!(fx.activity_log.len().await, 1);
    }

    #[tokio::test]
    async fn disallowed_origin_is_rejected_before_tool_logic() {
        let fx = fixture();
        let body = tool_call_body("log_activity", json!({ "description": "sneaky" }));
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .header("origin", "http://evil.example")
            .body(Body::from(body))
            .unwrap();

        let response = fx.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        // No tool logic ran.
        assert!(fx.activity_log.is_empty().await);
    }

    #[tokio::test]
    async fn allowlisted_origin_is_served() {
        let fx = fixture();
        let body = tool_call_body("log_activity", json!({ "description": "legit" }));
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .header("origin", "http://localhost:3000")
            .header("host", "localhost:3001")
            .body(Body::from(body))
            .unwrap();

        let response = fx.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fx.activity_log.len().await, 1);
    }

    #[tokio::test]
    async fn rebinding_host_header_is_rejected() {
        let fx = fixture();
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .header("host", "attacker.example")
            .body(Body::empty())
            .unwrap();
        let response = fx.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn health_reports_status_and_metrics() {
        let fx = fixture();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = fx.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["metrics"]["total_requests"].is_u64());
    }

    #[tokio::test]
    async fn metrics_endpoint_reflects_tool_traffic() {
        let fx = fixture();
        let body = tool_call_body("log_activity", json!({ "description": "one" }));
        fx.router.clone().oneshot(post_mcp(body)).await.unwrap();

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = fx.router.clone().oneshot(request).await.unwrap();
        let json = response_json(response).await;
        assert_eq!(json["metrics"]["total_requests"], 1);
        assert_eq!(json["metrics"]["activity_log_operations"], 1);
    }

    #[tokio::test]
    async fn unmatched_paths_get_envelope_404() {
        let fx = fixture();
        let request = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let response = fx.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn malformed_json_rpc_is_a_parse_error() {
        let fx = fixture();
        let response = fx
            .router
            .clone()
            .oneshot(post_mcp("{broken".into()))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn tools_list_matches_registry() {
        let fx = fixture();
        let body = json!({ "jsonrpc": "2.0", "id": 5, "method": "tools/list" }).to_string();
        let response = fx.router.clone().oneshot(post_mcp(body)).await.unwrap();
        let json = response_json(response).await;
        let listed = json["result"]["tools"].as_array().unwrap().len();
        assert_eq!(listed, fx.registry.definitions().len());
    }
}
