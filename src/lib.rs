//! Verdict Hub - verdict propagation service for threat analysis
//!
//! Analysts submit reclamations ("this flagged item is a false positive"),
//! an operator confirms or rejects them, and confirmed verdicts propagate to:
//!
//! - **Safe-Item Registry**: authoritative local table of known-safe items
//! - **Peer Authority**: remote verdict service kept in sync via push
//! - **Notification Store**: deduplicated append-only alert/verdict log
//! - **Alert Hub**: live WebSocket fan-out to dashboard subscribers
//!
//! ## Services
//!
//! - **Workflow**: reclamation state machine driving all propagation
//! - **Canonical**: URL normalization and stable content hashing
//! - **Store**: MongoDB-backed persistence with in-memory dev fallback

pub mod auth;
pub mod canonical;
pub mod config;
pub mod db;
pub mod hub;
pub mod peer;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;
pub mod workflow;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, VerdictError};
