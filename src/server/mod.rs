//! HTTP server
//!
//! hyper http1 with TokioIo, one spawned task per connection, WebSocket
//! upgrades enabled for the alert stream endpoint.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::hub::AlertHub;
use crate::peer::PeerSyncClient;
use crate::routes;
use crate::store::{
    MemoryNotificationStore, MemoryReclamationStore, MemorySafeItemRegistry, MongoNotificationStore,
    MongoReclamationStore, MongoSafeItemRegistry,
};
use crate::types::Result;
use crate::workflow::ReclamationWorkflow;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// MongoDB handle, None when running on in-memory stores (dev mode)
    pub mongo: Option<MongoClient>,
    /// Live alert broadcast hub
    pub hub: Arc<AlertHub>,
    /// Verdict-propagation workflow over the configured stores
    pub workflow: Arc<ReclamationWorkflow>,
}

impl AppState {
    /// Create AppState on in-memory stores (dev mode)
    pub fn in_memory(args: Args) -> Result<Self> {
        let hub = Arc::new(AlertHub::new(args.stream_capacity));
        let peer = build_peer_client(&args)?;

        let workflow = Arc::new(ReclamationWorkflow::new(
            Arc::new(MemoryReclamationStore::new()),
            Arc::new(MemorySafeItemRegistry::new()),
            Arc::new(MemoryNotificationStore::new()),
            Arc::clone(&hub),
            peer,
        ));

        Ok(Self {
            args,
            mongo: None,
            hub,
            workflow,
        })
    }

    /// Create AppState backed by MongoDB collections
    pub async fn with_mongo(args: Args, mongo: MongoClient) -> Result<Self> {
        let hub = Arc::new(AlertHub::new(args.stream_capacity));
        let peer = build_peer_client(&args)?;

        let reclamations = MongoReclamationStore::new(&mongo).await?;
        let registry = MongoSafeItemRegistry::new(&mongo).await?;
        let notifications = MongoNotificationStore::new(&mongo).await?;

        let workflow = Arc::new(ReclamationWorkflow::new(
            Arc::new(reclamations),
            Arc::new(registry),
            Arc::new(notifications),
            Arc::clone(&hub),
            peer,
        ));

        Ok(Self {
            args,
            mongo: Some(mongo),
            hub,
            workflow,
        })
    }
}

/// Build the peer sync client when a peer authority is configured
fn build_peer_client(args: &Args) -> Result<Option<Arc<PeerSyncClient>>> {
    match args.peer_verdict_endpoint() {
        Some(endpoint) => {
            let timeout = Duration::from_millis(args.peer_timeout_ms);
            let client = PeerSyncClient::new(endpoint, timeout)?;
            Ok(Some(Arc::new(client)))
        }
        None => Ok(None),
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Verdict hub listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    match state.args.peer_verdict_endpoint() {
        Some(endpoint) => info!("Peer verdict sync enabled -> {}", endpoint),
        None => info!("Peer verdict sync disabled (no peer authority configured)"),
    }

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory stores, data is not durable");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        (Method::GET, "/version") => routes::version_info(),

        (Method::OPTIONS, _) => preflight_response(),

        (Method::POST, "/api/reclamations") => routes::handle_submit(state, req).await,

        (Method::GET, "/api/reclamations/pending") => {
            routes::handle_pending(state, &req).await
        }

        (Method::POST, p) if p.starts_with("/api/reclamations/") && p.ends_with("/confirm") => {
            let id = p
                .trim_start_matches("/api/reclamations/")
                .trim_end_matches("/confirm")
                .to_string();
            if id.is_empty() || id.contains('/') {
                not_found_response(&path)
            } else {
                routes::handle_confirm(state, req, &id).await
            }
        }

        (Method::POST, "/api/notifications") => {
            routes::handle_ingest_notification(state, req).await
        }

        (Method::GET, "/api/alerts/unresolved") => routes::handle_unresolved(state, &req).await,

        (Method::GET, "/api/alerts/history") => routes::handle_history(state, &req).await,

        (Method::GET, "/api/alerts/stream") => routes::handle_alert_stream(state, req).await,

        (Method::GET, p) if p.starts_with("/api/safe-items/") => {
            let rest = p.trim_start_matches("/api/safe-items/");
            match rest.split_once('/') {
                Some((threat_type, item_hash))
                    if !threat_type.is_empty()
                        && !item_hash.is_empty()
                        && !item_hash.contains('/') =>
                {
                    routes::handle_safe_item(state, &req, threat_type, item_hash).await
                }
                _ => routes::error_response(
                    StatusCode::BAD_REQUEST,
                    "expected /api/safe-items/{threatType}/{itemHash}",
                    "bad_request",
                ),
            }
        }

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-Auth-User, X-Auth-Roles",
        )
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 404 response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {}", path),
        "not_found",
    )
}
