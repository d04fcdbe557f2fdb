//! HTTP routes for Verdict Hub

pub mod alerts;
pub mod health;
pub mod stream;

pub use alerts::{
    handle_confirm, handle_history, handle_ingest_notification, handle_pending, handle_safe_item,
    handle_submit, handle_unresolved,
};
pub use health::{health_check, version_info};
pub use stream::handle_alert_stream;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{Result, VerdictError};

/// API error response body
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: &'static str,
}

/// Build a JSON error response
pub fn error_response(status: StatusCode, message: &str, code: &'static str) -> Response<Full<Bytes>> {
    let error = ApiError {
        error: message.to_string(),
        code,
    };
    let body = serde_json::to_vec(&error).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Map a VerdictError to its JSON error response
pub fn verdict_error_response(err: &VerdictError) -> Response<Full<Bytes>> {
    error_response(err.status_code(), &err.to_string(), err.code())
}

/// Build a successful JSON response
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(data) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Response build failed",
                    "internal_error",
                )
            }),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Serialization failed: {}", e),
            "internal_error",
        ),
    }
}

/// Collect and deserialize a JSON request body
pub async fn read_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| VerdictError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&body)
        .map_err(|e| VerdictError::BadRequest(format!("Invalid JSON body: {}", e)))
}
