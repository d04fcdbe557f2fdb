//! Storage traits for the three persisted tables
//!
//! Two implementations exist behind each trait: a MongoDB-backed one for
//! production (`store::mongo`) and an in-memory one (`store::memory`) used
//! in dev mode without MongoDB and by the unit tests. The dedup guarantees
//! live at this layer — unique indexes in Mongo, a single lock over the
//! keyed maps in memory — so concurrent callers cannot race past them.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::db::schemas::{NotificationDoc, ReclamationDoc, SafeItemDoc};
use crate::types::Result;

pub use memory::{MemoryNotificationStore, MemoryReclamationStore, MemorySafeItemRegistry};
pub use mongo::{MongoNotificationStore, MongoReclamationStore, MongoSafeItemRegistry};

/// Persistence for reclamations and their single state transition
#[async_trait]
pub trait ReclamationStore: Send + Sync {
    /// Insert an unprocessed reclamation.
    ///
    /// Fails with `DuplicatePending` when an unprocessed reclamation already
    /// exists for the same (item_hash, threat_type). The check is atomic with
    /// the insert.
    async fn insert_pending(&self, rec: ReclamationDoc) -> Result<ReclamationDoc>;

    /// Look up a reclamation by its external id
    async fn find_by_id(&self, id: &str) -> Result<Option<ReclamationDoc>>;

    /// Unprocessed reclamations in insertion order (operator queue)
    async fn list_pending(&self) -> Result<Vec<ReclamationDoc>>;

    /// Atomically transition a reclamation to processed with the given
    /// verdict.
    ///
    /// Returns the updated document when *this call* performed the
    /// transition, or `None` when no unprocessed reclamation with that id
    /// exists (unknown id or already terminal — callers disambiguate with
    /// [`find_by_id`](Self::find_by_id)). Exactly one of two concurrent
    /// calls for the same id sees `Some`.
    async fn mark_processed(&self, id: &str, safe: bool) -> Result<Option<ReclamationDoc>>;
}

/// Authoritative known-safe verdict table
#[async_trait]
pub trait SafeItemRegistry: Send + Sync {
    /// Upsert the verdict row for (item_hash, threat_type).
    ///
    /// Updates in place when the key exists, inserts otherwise; idempotent
    /// under repeated identical calls and last-writer-wins under concurrent
    /// differing ones. No deletion is exposed.
    async fn upsert(
        &self,
        item_hash: &str,
        threat_type: &str,
        is_safe: bool,
        admin_confirmed: bool,
    ) -> Result<SafeItemDoc>;

    /// Pure read of the verdict row for (item_hash, threat_type)
    async fn lookup(&self, item_hash: &str, threat_type: &str) -> Result<Option<SafeItemDoc>>;

    /// Whether the item carries an admin-confirmed verdict; false when unknown
    async fn is_item_safe(&self, item_hash: &str, threat_type: &str) -> Result<bool> {
        Ok(self
            .lookup(item_hash, threat_type)
            .await?
            .map(|item| item.admin_confirmed)
            .unwrap_or(false))
    }
}

/// Append-only, insert-deduplicated event log
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a notification.
    ///
    /// Returns `true` when stored, `false` when a row with the same
    /// (details_hash, threat_type) already exists. A `false` return means
    /// "already recorded, do not broadcast again".
    async fn insert(&self, notification: NotificationDoc) -> Result<bool>;

    /// Rows with is_safe=false and admin_confirmed=false, insertion order
    async fn list_unresolved(&self) -> Result<Vec<NotificationDoc>>;

    /// Full append-only history, insertion order
    async fn list_all(&self) -> Result<Vec<NotificationDoc>>;
}
