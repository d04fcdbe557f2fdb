//! Notification document schema
//!
//! Append-only event log of alert/verdict events. Deduplicated on
//! (details_hash, threat_type) at insert time; never updated or deleted.
//! Note the dedup key is payload-derived, independent from the safe-item
//! table's locator-derived item_hash.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

/// Notification document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotificationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable external identifier
    pub id: String,

    /// Threat class of the event
    pub threat_type: String,

    /// Opaque details payload carried from the originating event
    pub details: String,

    /// Hash of the full details payload (dedup key with threat_type)
    pub details_hash: String,

    /// User the event concerns
    pub user: String,

    /// Event timestamp, RFC 3339
    pub timestamp: String,

    /// Verdict carried by the event
    pub is_safe: bool,

    /// Whether an administrator confirmed the verdict
    pub admin_confirmed: bool,
}

impl NotificationDoc {
    /// Create a new notification, deriving details_hash and stamping the
    /// timestamp
    pub fn new(
        threat_type: String,
        details: String,
        user: String,
        is_safe: bool,
        admin_confirmed: bool,
    ) -> Self {
        let details_hash = crate::canonical::details_hash(&details);
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            threat_type,
            details,
            details_hash,
            user,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_safe,
            admin_confirmed,
        }
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Insert-time dedup gate for the event log
            (
                doc! { "details_hash": 1, "threat_type": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("details_threat_unique".to_string())
                        .build(),
                ),
            ),
            // Unresolved-alert dashboard queries
            (
                doc! { "is_safe": 1, "admin_confirmed": 1 },
                Some(
                    IndexOptions::builder()
                        .name("unresolved_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for NotificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
