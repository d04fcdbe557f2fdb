//! Health and version endpoints
//!
//! - /health, /healthz - liveness probe (is the service running?)
//! - /version - build information for deployment verification
//!
//! Liveness returns 200 whenever the service is up. The body reports
//! whether the durable store is MongoDB-backed or in-memory (dev mode)
//! and whether a peer authority is configured, for informational use.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    status: &'static str,
    version: &'static str,
    timestamp: String,
    mode: String,
    node_id: String,
    storage: StorageHealth,
    peer: PeerHealth,
    stream_subscribers: usize,
}

#[derive(Serialize)]
struct StorageHealth {
    backend: &'static str,
    connected: bool,
}

#[derive(Serialize)]
struct PeerHealth {
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_connected = state.mongo.is_some();

    let response = HealthResponse {
        healthy: true,
        status: if mongo_connected || state.args.dev_mode {
            "online"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        storage: StorageHealth {
            backend: if mongo_connected { "mongodb" } else { "memory" },
            connected: mongo_connected,
        },
        peer: PeerHealth {
            configured: state.args.peer_authority_url.is_some(),
            endpoint: state.args.peer_verdict_endpoint(),
        },
        stream_subscribers: state.hub.subscriber_count(),
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Version information for deployment verification
#[derive(Serialize)]
struct VersionResponse {
    version: &'static str,
    commit: &'static str,
    build_time: &'static str,
    service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "verdict-hub",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
