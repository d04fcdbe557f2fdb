//! Reclamation and alert API handlers
//!
//! ## Routes
//!
//! - `POST /api/reclamations` - submit a reclamation (any authenticated caller)
//! - `GET  /api/reclamations/pending` - operator queue
//! - `POST /api/reclamations/{id}/confirm` - issue a verdict (admin role)
//! - `POST /api/notifications` - ingest an externally produced alert
//! - `GET  /api/alerts/unresolved` - dashboard list of open alerts
//! - `GET  /api/alerts/history` - full append-only event log
//! - `GET  /api/safe-items/{threatType}/{itemHash}` - verdict lookup

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::CallerIdentity;
use crate::db::schemas::NotificationDoc;
use crate::routes::{json_response, read_json_body, verdict_error_response};
use crate::server::AppState;

/// Submission request body. `details` is an opaque payload that must carry
/// a recoverable locator; a bare string is treated as the locator itself.
#[derive(Debug, Deserialize)]
struct SubmitRequest {
    threat_type: String,
    details: Value,
}

/// Confirmation request body
#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    safe: bool,
}

/// Ingest request body for externally produced notifications
#[derive(Debug, Deserialize)]
struct IngestRequest {
    threat_type: String,
    details: Value,
    #[serde(default)]
    is_safe: bool,
    #[serde(default)]
    admin_confirmed: bool,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    stored: bool,
}

#[derive(Debug, Serialize)]
struct SafeItemResponse {
    item_hash: String,
    threat_type: String,
    safe: bool,
}

/// Render a details JSON value to its stored string form
fn details_to_string(details: &Value) -> String {
    match details {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Handle `POST /api/reclamations`
pub async fn handle_submit(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let caller = match CallerIdentity::from_headers(req.headers()) {
        Ok(caller) => caller,
        Err(e) => return verdict_error_response(&e),
    };

    let body: SubmitRequest = match read_json_body(req).await {
        Ok(body) => body,
        Err(e) => return verdict_error_response(&e),
    };

    let details = details_to_string(&body.details);
    match state.workflow.submit(&caller, &body.threat_type, &details).await {
        Ok(rec) => json_response(StatusCode::CREATED, &rec),
        Err(e) => verdict_error_response(&e),
    }
}

/// Handle `GET /api/reclamations/pending`
pub async fn handle_pending(
    state: Arc<AppState>,
    req: &Request<Incoming>,
) -> Response<Full<Bytes>> {
    if let Err(e) = CallerIdentity::from_headers(req.headers()) {
        return verdict_error_response(&e);
    }

    match state.workflow.pending_reclamations().await {
        Ok(pending) => json_response(StatusCode::OK, &pending),
        Err(e) => verdict_error_response(&e),
    }
}

/// Handle `POST /api/reclamations/{id}/confirm`
pub async fn handle_confirm(
    state: Arc<AppState>,
    req: Request<Incoming>,
    reclamation_id: &str,
) -> Response<Full<Bytes>> {
    let caller = match CallerIdentity::from_headers(req.headers()) {
        Ok(caller) => caller,
        Err(e) => return verdict_error_response(&e),
    };
    if let Err(e) = caller.require_admin() {
        return verdict_error_response(&e);
    }

    let body: ConfirmRequest = match read_json_body(req).await {
        Ok(body) => body,
        Err(e) => return verdict_error_response(&e),
    };

    match state.workflow.confirm(&caller, reclamation_id, body.safe).await {
        // A failed peer sync is still a confirmed reclamation; the outcome
        // body carries the degraded peer_sync status for the operator
        Ok(outcome) => json_response(StatusCode::OK, &outcome),
        Err(e) => verdict_error_response(&e),
    }
}

/// Handle `POST /api/notifications`
pub async fn handle_ingest_notification(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let caller = match CallerIdentity::from_headers(req.headers()) {
        Ok(caller) => caller,
        Err(e) => return verdict_error_response(&e),
    };

    let body: IngestRequest = match read_json_body(req).await {
        Ok(body) => body,
        Err(e) => return verdict_error_response(&e),
    };

    let notification = NotificationDoc::new(
        body.threat_type,
        details_to_string(&body.details),
        caller.user,
        body.is_safe,
        body.admin_confirmed,
    );

    match state.workflow.ingest_notification(notification).await {
        Ok(stored) => json_response(StatusCode::OK, &IngestResponse { stored }),
        Err(e) => verdict_error_response(&e),
    }
}

/// Handle `GET /api/alerts/unresolved`
pub async fn handle_unresolved(
    state: Arc<AppState>,
    req: &Request<Incoming>,
) -> Response<Full<Bytes>> {
    if let Err(e) = CallerIdentity::from_headers(req.headers()) {
        return verdict_error_response(&e);
    }

    match state.workflow.unresolved_alerts().await {
        Ok(alerts) => json_response(StatusCode::OK, &alerts),
        Err(e) => verdict_error_response(&e),
    }
}

/// Handle `GET /api/alerts/history`
pub async fn handle_history(
    state: Arc<AppState>,
    req: &Request<Incoming>,
) -> Response<Full<Bytes>> {
    if let Err(e) = CallerIdentity::from_headers(req.headers()) {
        return verdict_error_response(&e);
    }

    match state.workflow.alert_history().await {
        Ok(history) => json_response(StatusCode::OK, &history),
        Err(e) => verdict_error_response(&e),
    }
}

/// Handle `GET /api/safe-items/{threatType}/{itemHash}`
///
/// Unknown items answer `safe: false` rather than 404 - peers treat the
/// registry as a total function over items.
pub async fn handle_safe_item(
    state: Arc<AppState>,
    req: &Request<Incoming>,
    threat_type: &str,
    item_hash: &str,
) -> Response<Full<Bytes>> {
    if let Err(e) = CallerIdentity::from_headers(req.headers()) {
        return verdict_error_response(&e);
    }

    match state.workflow.safe_item(item_hash, threat_type).await {
        Ok(found) => {
            let safe = found.map(|item| item.admin_confirmed).unwrap_or(false);
            json_response(
                StatusCode::OK,
                &SafeItemResponse {
                    item_hash: item_hash.to_string(),
                    threat_type: threat_type.to_string(),
                    safe,
                },
            )
        }
        Err(e) => verdict_error_response(&e),
    }
}
