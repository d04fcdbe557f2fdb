//! Safe-item document schema
//!
//! Authoritative "is this specific item, of this threat class, known safe"
//! fact table. One row per (item_hash, threat_type); repeated confirmations
//! update in place. Entries persist for the lifetime of the data store.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for safe items
pub const SAFE_ITEM_COLLECTION: &str = "safe_items";

/// Safe-item document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SafeItemDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable external identifier
    pub id: String,

    /// Canonical hash of the item's locator
    pub item_hash: String,

    /// Threat class this verdict applies to
    pub threat_type: String,

    /// Operator verdict: whether the item is safe
    pub is_safe: bool,

    /// Whether an administrator confirmed the verdict
    pub admin_confirmed: bool,
}

impl SafeItemDoc {
    /// Create a new safe-item entry
    pub fn new(item_hash: String, threat_type: String, is_safe: bool, admin_confirmed: bool) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            item_hash,
            threat_type,
            is_safe,
            admin_confirmed,
        }
    }
}

impl IntoIndexes for SafeItemDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One verdict row per (item_hash, threat_type)
            (
                doc! { "item_hash": 1, "threat_type": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("item_threat_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SafeItemDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
