//! Live alert stream over WebSocket
//!
//! `GET /api/alerts/stream` upgrades to a WebSocket carrying every
//! notification stored after the subscription began, in publish order.
//! Delivery is best-effort: a subscriber that lags past the hub's buffer
//! is told how many messages it missed and resumes with the newest ones.
//! Disconnects never affect other subscribers or the publisher.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::auth::CallerIdentity;
use crate::db::schemas::NotificationDoc;
use crate::hub::AlertHub;
use crate::routes::verdict_error_response;
use crate::server::AppState;

/// WebSocket type after upgrade
type HyperWebSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;

/// Message sent from server to stream subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamMessage {
    /// A newly stored notification
    Alert { alert: NotificationDoc },
    /// The subscriber fell behind and missed `missed` notifications;
    /// the durable record is still complete in the store
    Lagged { missed: u64 },
}

/// Handle WebSocket upgrade for the alert stream
pub async fn handle_alert_stream(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let caller = match CallerIdentity::from_headers(req.headers()) {
        Ok(caller) => caller,
        Err(e) => return verdict_error_response(&e),
    };

    if !hyper_tungstenite::is_upgrade_request(&req) {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(
                r#"{"error":"WebSocket upgrade required"}"#,
            )))
            .unwrap();
    }

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok((resp, ws)) => (resp, ws),
        Err(e) => {
            warn!("WebSocket upgrade failed: {}", e);
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from("WebSocket upgrade failed")))
                .unwrap();
        }
    };

    let hub = Arc::clone(&state.hub);
    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => {
                if let Err(e) = handle_stream_connection(ws, hub, &caller.user).await {
                    warn!(user = %caller.user, "Alert stream error: {}", e);
                }
            }
            Err(e) => {
                warn!("WebSocket connection failed: {}", e);
            }
        }
    });

    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

/// Pump hub messages to one subscriber until either side disconnects
async fn handle_stream_connection(
    ws: HyperWebSocket,
    hub: Arc<AlertHub>,
    user: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (mut sender, mut receiver) = ws.split();
    let mut rx = hub.subscribe();

    info!(user = %user, "Alert stream subscriber connected");

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let stream_msg = match msg {
                    Ok(alert) => StreamMessage::Alert { alert },
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(user = %user, missed, "Alert stream subscriber lagged");
                        StreamMessage::Lagged { missed }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let json = serde_json::to_string(&stream_msg)?;
                if sender.send(WsMessage::Text(json)).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!(user = %user, "Alert stream subscriber disconnected");
                        break;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sender.send(WsMessage::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!(user = %user, "Alert stream socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(user = %user, "Alert stream connection closed");
    Ok(())
}
