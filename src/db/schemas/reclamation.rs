//! Reclamation document schema
//!
//! A reclamation is a submitted complaint about a flagged item, pending an
//! operator verdict. Created with `processed = false` and mutated exactly
//! once when the operator confirms; never deleted.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for reclamations
pub const RECLAMATION_COLLECTION: &str = "reclamations";

/// Reclamation document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReclamationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable external identifier
    pub id: String,

    /// Identity of the submitting user (resolved upstream, trusted here)
    pub user: String,

    /// Canonical hash of the reported item's locator
    pub item_hash: String,

    /// Threat class the item was flagged under
    pub threat_type: String,

    /// Opaque details payload; contains the recoverable locator
    pub details: String,

    /// Whether an operator has issued a verdict (terminal once true)
    pub processed: bool,

    /// Operator verdict; meaningful only when processed
    pub safe: bool,
}

impl ReclamationDoc {
    /// Create a new unprocessed reclamation
    pub fn new(user: String, item_hash: String, threat_type: String, details: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            user,
            item_hash,
            threat_type,
            details,
            processed: false,
            safe: false,
        }
    }
}

impl IntoIndexes for ReclamationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on external id
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("reclamation_id_unique".to_string())
                        .build(),
                ),
            ),
            // At most one *unprocessed* reclamation per (item_hash, threat_type);
            // the partial filter keeps processed history out of the constraint
            (
                doc! { "item_hash": 1, "threat_type": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "processed": false })
                        .name("pending_item_threat_unique".to_string())
                        .build(),
                ),
            ),
            // Operator queue lookups
            (
                doc! { "processed": 1 },
                Some(
                    IndexOptions::builder()
                        .name("processed_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ReclamationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
