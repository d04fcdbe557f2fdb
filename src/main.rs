//! Verdict Hub - verdict propagation service for threat analysis

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verdict_hub::config::Args;
use verdict_hub::db::MongoClient;
use verdict_hub::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("verdict_hub={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Verdict Hub");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    match args.peer_authority_url {
        Some(ref url) => info!("Peer authority: {}", url),
        None => info!("Peer authority: (none)"),
    }
    info!("Stream capacity: {}", args.stream_capacity);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "MongoDB connection failed (dev mode, using in-memory stores): {}",
                    e
                );
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = match mongo {
        Some(client) => AppState::with_mongo(args, client).await?,
        None => AppState::in_memory(args)?,
    };

    server::run(Arc::new(state)).await?;

    Ok(())
}
