//! Configuration for Verdict Hub
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Verdict Hub - verdict propagation service for threat analysis
#[derive(Parser, Debug, Clone)]
#[command(name = "verdict-hub")]
#[command(about = "Deduplicating alert store, live broadcast feed, and peer verdict sync")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "verdict_hub")]
    pub mongodb_db: String,

    /// Base URL of the peer verdict authority (e.g. "https://peer.example.org")
    /// Confirmed safe verdicts are pushed to {url}/api/verdicts.
    /// When unset, peer sync is disabled and confirmations stay local.
    #[arg(long, env = "PEER_AUTHORITY_URL")]
    pub peer_authority_url: Option<String>,

    /// Peer sync request timeout in milliseconds (per attempt)
    #[arg(long, env = "PEER_TIMEOUT_MS", default_value = "10000")]
    pub peer_timeout_ms: u64,

    /// Alert stream channel capacity (per-subscriber buffered messages)
    /// Slow subscribers that fall further behind than this drop the oldest
    /// messages; the store remains the durable record.
    #[arg(long, env = "STREAM_CAPACITY", default_value = "1024")]
    pub stream_capacity: usize,

    /// Enable development mode (in-memory stores when MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Peer verdict endpoint derived from the authority base URL
    pub fn peer_verdict_endpoint(&self) -> Option<String> {
        self.peer_authority_url
            .as_ref()
            .map(|base| format!("{}/api/verdicts", base.trim_end_matches('/')))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.stream_capacity == 0 {
            return Err("STREAM_CAPACITY must be greater than zero".to_string());
        }

        if let Some(ref url) = self.peer_authority_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("PEER_AUTHORITY_URL must be http(s): {}", url));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let args = Args::parse_from(["verdict-hub"]);
        assert!(args.validate().is_ok());
        assert!(args.peer_verdict_endpoint().is_none());
    }

    #[test]
    fn test_peer_endpoint_trims_trailing_slash() {
        let args = Args::parse_from([
            "verdict-hub",
            "--peer-authority-url",
            "https://peer.example.org/",
        ]);
        assert_eq!(
            args.peer_verdict_endpoint().as_deref(),
            Some("https://peer.example.org/api/verdicts")
        );
    }

    #[test]
    fn test_rejects_non_http_peer_url() {
        let args = Args::parse_from(["verdict-hub", "--peer-authority-url", "ftp://x"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_stream_capacity() {
        let args = Args::parse_from(["verdict-hub", "--stream-capacity", "0"]);
        assert!(args.validate().is_err());
    }
}
