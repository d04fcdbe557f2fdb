//! In-memory store implementations
//!
//! Used in dev mode when MongoDB is unreachable, and by the unit tests.
//! The reclamation and notification stores take one async mutex over their
//! keyed state so the dedup check and the write are a single critical
//! section; the safe-item registry rides on DashMap's per-shard locking.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

use crate::db::schemas::{NotificationDoc, ReclamationDoc, SafeItemDoc};
use crate::store::{NotificationStore, ReclamationStore, SafeItemRegistry};
use crate::types::{Result, VerdictError};

/// In-memory reclamation store
#[derive(Default)]
pub struct MemoryReclamationStore {
    inner: Mutex<ReclamationState>,
}

#[derive(Default)]
struct ReclamationState {
    by_id: HashMap<String, ReclamationDoc>,
    /// Insertion order of external ids
    order: Vec<String>,
    /// (item_hash, threat_type) -> id of the one unprocessed reclamation
    pending: HashMap<(String, String), String>,
}

impl MemoryReclamationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReclamationStore for MemoryReclamationStore {
    async fn insert_pending(&self, rec: ReclamationDoc) -> Result<ReclamationDoc> {
        let mut state = self.inner.lock().await;
        let key = (rec.item_hash.clone(), rec.threat_type.clone());

        if state.pending.contains_key(&key) {
            return Err(VerdictError::DuplicatePending(format!(
                "{}/{}",
                rec.item_hash, rec.threat_type
            )));
        }

        state.pending.insert(key, rec.id.clone());
        state.order.push(rec.id.clone());
        state.by_id.insert(rec.id.clone(), rec.clone());

        debug!(id = %rec.id, threat_type = %rec.threat_type, "Reclamation stored (memory)");
        Ok(rec)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ReclamationDoc>> {
        let state = self.inner.lock().await;
        Ok(state.by_id.get(id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<ReclamationDoc>> {
        let state = self.inner.lock().await;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.by_id.get(id))
            .filter(|rec| !rec.processed)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: &str, safe: bool) -> Result<Option<ReclamationDoc>> {
        let mut state = self.inner.lock().await;

        let updated = match state.by_id.get_mut(id) {
            Some(rec) if !rec.processed => {
                rec.processed = true;
                rec.safe = safe;
                rec.metadata.updated_at = Some(bson::DateTime::now());
                rec.clone()
            }
            _ => return Ok(None),
        };

        let key = (updated.item_hash.clone(), updated.threat_type.clone());
        state.pending.remove(&key);

        Ok(Some(updated))
    }
}

/// In-memory safe-item registry
#[derive(Default)]
pub struct MemorySafeItemRegistry {
    items: DashMap<(String, String), SafeItemDoc>,
}

impl MemorySafeItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SafeItemRegistry for MemorySafeItemRegistry {
    async fn upsert(
        &self,
        item_hash: &str,
        threat_type: &str,
        is_safe: bool,
        admin_confirmed: bool,
    ) -> Result<SafeItemDoc> {
        let key = (item_hash.to_string(), threat_type.to_string());

        let entry = self
            .items
            .entry(key)
            .and_modify(|item| {
                item.is_safe = is_safe;
                item.admin_confirmed = admin_confirmed;
                item.metadata.updated_at = Some(bson::DateTime::now());
            })
            .or_insert_with(|| {
                SafeItemDoc::new(
                    item_hash.to_string(),
                    threat_type.to_string(),
                    is_safe,
                    admin_confirmed,
                )
            });

        Ok(entry.clone())
    }

    async fn lookup(&self, item_hash: &str, threat_type: &str) -> Result<Option<SafeItemDoc>> {
        let key = (item_hash.to_string(), threat_type.to_string());
        Ok(self.items.get(&key).map(|item| item.clone()))
    }
}

/// In-memory notification store
#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: Mutex<NotificationState>,
}

#[derive(Default)]
struct NotificationState {
    /// (details_hash, threat_type) pairs already recorded
    seen: HashSet<(String, String)>,
    /// Append-only event log in insertion order
    log: Vec<NotificationDoc>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: NotificationDoc) -> Result<bool> {
        let mut state = self.inner.lock().await;
        let key = (
            notification.details_hash.clone(),
            notification.threat_type.clone(),
        );

        if !state.seen.insert(key) {
            debug!(
                details_hash = %notification.details_hash,
                threat_type = %notification.threat_type,
                "Duplicate notification skipped (memory)"
            );
            return Ok(false);
        }

        state.log.push(notification);
        Ok(true)
    }

    async fn list_unresolved(&self) -> Result<Vec<NotificationDoc>> {
        let state = self.inner.lock().await;
        Ok(state
            .log
            .iter()
            .filter(|n| !n.is_safe && !n.admin_confirmed)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<NotificationDoc>> {
        let state = self.inner.lock().await;
        Ok(state.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::threat;

    fn reclamation(hash: &str, threat: &str) -> ReclamationDoc {
        ReclamationDoc::new(
            "analyst-a".to_string(),
            hash.to_string(),
            threat.to_string(),
            r#"{"url":"http://x.com/p"}"#.to_string(),
        )
    }

    fn notification(details: &str, threat: &str) -> NotificationDoc {
        NotificationDoc::new(
            threat.to_string(),
            details.to_string(),
            "analyst-a".to_string(),
            false,
            false,
        )
    }

    #[tokio::test]
    async fn test_second_pending_insert_rejected() {
        let store = MemoryReclamationStore::new();
        store.insert_pending(reclamation("h1", threat::PHISHING)).await.unwrap();

        let err = store
            .insert_pending(reclamation("h1", threat::PHISHING))
            .await
            .unwrap_err();
        assert!(matches!(err, VerdictError::DuplicatePending(_)));

        // Different threat class for the same hash is its own pending slot
        store.insert_pending(reclamation("h1", threat::CODE_SAFETY)).await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_slot_reopens_after_processing() {
        let store = MemoryReclamationStore::new();
        let first = store.insert_pending(reclamation("h1", threat::PHISHING)).await.unwrap();

        store.mark_processed(&first.id, false).await.unwrap().unwrap();

        // Terminal reclamation no longer blocks a fresh submission
        store.insert_pending(reclamation("h1", threat::PHISHING)).await.unwrap();
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_processed_is_single_shot() {
        let store = MemoryReclamationStore::new();
        let rec = store.insert_pending(reclamation("h1", threat::PHISHING)).await.unwrap();

        let first = store.mark_processed(&rec.id, true).await.unwrap();
        assert!(first.as_ref().map(|r| r.processed).unwrap_or(false));
        assert!(first.map(|r| r.safe).unwrap_or(false));

        // Second transition attempt observes the terminal state
        assert!(store.mark_processed(&rec.id, false).await.unwrap().is_none());
        let stored = store.find_by_id(&rec.id).await.unwrap().unwrap();
        assert!(stored.safe, "second call must not overwrite the verdict");
    }

    #[tokio::test]
    async fn test_mark_processed_unknown_id() {
        let store = MemoryReclamationStore::new();
        assert!(store.mark_processed("missing", true).await.unwrap().is_none());
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_submissions_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(MemoryReclamationStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert_pending(reclamation("h1", threat::PHISHING)).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_upsert_idempotent() {
        let registry = MemorySafeItemRegistry::new();
        let first = registry.upsert("h1", "Phishing", true, true).await.unwrap();
        let second = registry.upsert("h1", "Phishing", true, true).await.unwrap();

        assert_eq!(first.id, second.id, "upsert must not create a second row");
        let found = registry.lookup("h1", threat::PHISHING).await.unwrap().unwrap();
        assert!(found.is_safe);
        assert!(found.admin_confirmed);
    }

    #[tokio::test]
    async fn test_registry_upsert_updates_in_place() {
        let registry = MemorySafeItemRegistry::new();
        registry.upsert("h1", "Phishing", true, false).await.unwrap();
        let updated = registry.upsert("h1", "Phishing", false, true).await.unwrap();

        assert!(!updated.is_safe);
        assert!(updated.admin_confirmed);
        assert!(registry.is_item_safe("h1", threat::PHISHING).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_item_safe_defaults_false() {
        let registry = MemorySafeItemRegistry::new();
        assert!(!registry.is_item_safe("unknown", threat::PHISHING).await.unwrap());
    }

    #[tokio::test]
    async fn test_notification_insert_dedup() {
        let store = MemoryNotificationStore::new();
        assert!(store.insert(notification("d1", threat::PHISHING)).await.unwrap());
        assert!(!store.insert(notification("d1", threat::PHISHING)).await.unwrap());
        // Same payload under another threat class is a distinct event
        assert!(store.insert(notification("d1", threat::DOS)).await.unwrap());

        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_filters_and_preserves_order() {
        let store = MemoryNotificationStore::new();
        store.insert(notification("d1", threat::PHISHING)).await.unwrap();
        store
            .insert(NotificationDoc::new(
                "Phishing".to_string(),
                "d2".to_string(),
                "analyst-a".to_string(),
                true,
                true,
            ))
            .await
            .unwrap();
        store.insert(notification("d3", threat::PHISHING)).await.unwrap();

        let unresolved = store.list_unresolved().await.unwrap();
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].details, "d1");
        assert_eq!(unresolved[1].details, "d3");
    }
}
