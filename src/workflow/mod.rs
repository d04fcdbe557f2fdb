//! Reclamation Workflow - the verdict-propagation state machine
//!
//! States: `Submitted` (processed=false) → `ConfirmedSafe` | `ConfirmedUnsafe`
//! (processed=true), terminal once processed. On a safe verdict the workflow
//! drives, in order:
//!
//! 1. Safe-Item Registry upsert (commits before any network wait)
//! 2. Peer-Sync push - failure degrades the result but rolls nothing back
//! 3. Notification build + deduplicated store insert
//! 4. Alert Hub publish (skipped only when the insert was a duplicate;
//!    publish is independent of the peer sync outcome)

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::CallerIdentity;
use crate::canonical;
use crate::db::schemas::{NotificationDoc, ReclamationDoc, SafeItemDoc};
use crate::hub::AlertHub;
use crate::peer::{PeerSyncClient, VerdictPayload};
use crate::store::{NotificationStore, ReclamationStore, SafeItemRegistry};
use crate::types::{Result, VerdictError};

/// Outcome of the peer sync step within a confirmation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeerSyncStatus {
    /// Verdict delivered to the peer authority
    Synced { attempts: u32 },
    /// All attempts exhausted; local and peer state may now disagree and
    /// the operator must reconcile out of band
    Failed { error: String },
    /// Nothing to push (unsafe verdict, or no peer authority configured)
    Skipped,
}

impl PeerSyncStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a confirmation, including degraded-success detail
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    /// The reclamation in its terminal state
    pub reclamation: ReclamationDoc,
    /// Registry row upserted for a safe verdict
    pub safe_item: Option<SafeItemDoc>,
    /// Whether a notification was stored (false = duplicate, publish skipped)
    pub notified: bool,
    /// Peer sync result; `Failed` means the confirmation succeeded locally
    /// but synchronization may be inconsistent
    pub peer_sync: PeerSyncStatus,
}

/// The verdict-propagation workflow over its four collaborators
pub struct ReclamationWorkflow {
    reclamations: Arc<dyn ReclamationStore>,
    registry: Arc<dyn SafeItemRegistry>,
    notifications: Arc<dyn NotificationStore>,
    hub: Arc<AlertHub>,
    peer: Option<Arc<PeerSyncClient>>,
}

impl ReclamationWorkflow {
    pub fn new(
        reclamations: Arc<dyn ReclamationStore>,
        registry: Arc<dyn SafeItemRegistry>,
        notifications: Arc<dyn NotificationStore>,
        hub: Arc<AlertHub>,
        peer: Option<Arc<PeerSyncClient>>,
    ) -> Self {
        Self {
            reclamations,
            registry,
            notifications,
            hub,
            peer,
        }
    }

    /// Submit a reclamation for the item described by `details`.
    ///
    /// The locator is recovered from the details payload and canonicalized;
    /// an unprocessed reclamation for the same (item_hash, threat_type)
    /// rejects the submission with `DuplicatePending`.
    pub async fn submit(
        &self,
        caller: &CallerIdentity,
        threat_type: &str,
        details: &str,
    ) -> Result<ReclamationDoc> {
        if threat_type.trim().is_empty() {
            return Err(VerdictError::BadRequest(
                "threat_type must not be empty".to_string(),
            ));
        }

        let locator = canonical::extract_locator(details)?;
        let item_hash = canonical::item_hash(&locator)?;

        let rec = ReclamationDoc::new(
            caller.user.clone(),
            item_hash,
            threat_type.trim().to_string(),
            details.to_string(),
        );

        let stored = self.reclamations.insert_pending(rec).await?;

        info!(
            id = %stored.id,
            user = %stored.user,
            threat_type = %stored.threat_type,
            "Reclamation submitted"
        );

        Ok(stored)
    }

    /// Confirm a reclamation with the operator's verdict.
    ///
    /// Exactly one confirmation wins per reclamation; later calls observe
    /// `AlreadyProcessed`. A safe verdict propagates to the registry, the
    /// peer authority, the notification log, and the live feed.
    pub async fn confirm(
        &self,
        caller: &CallerIdentity,
        reclamation_id: &str,
        verdict_safe: bool,
    ) -> Result<ConfirmOutcome> {
        // Atomic single transition at the store layer; the loser of a race
        // falls through to the disambiguation below
        let rec = match self
            .reclamations
            .mark_processed(reclamation_id, verdict_safe)
            .await?
        {
            Some(rec) => rec,
            None => {
                return match self.reclamations.find_by_id(reclamation_id).await? {
                    Some(_) => Err(VerdictError::AlreadyProcessed(reclamation_id.to_string())),
                    None => Err(VerdictError::NotFound(format!(
                        "reclamation {}",
                        reclamation_id
                    ))),
                };
            }
        };

        info!(
            id = %rec.id,
            operator = %caller.user,
            safe = verdict_safe,
            "Reclamation confirmed"
        );

        if !verdict_safe {
            return Ok(ConfirmOutcome {
                reclamation: rec,
                safe_item: None,
                notified: false,
                peer_sync: PeerSyncStatus::Skipped,
            });
        }

        // Local verdict commits before any network wait, and no store lock
        // is held across the peer retry loop
        let safe_item = self
            .registry
            .upsert(&rec.item_hash, &rec.threat_type, true, true)
            .await?;

        let peer_sync = match &self.peer {
            Some(peer) => {
                let payload = VerdictPayload {
                    item_hash: rec.item_hash.clone(),
                    threat_type: rec.threat_type.clone(),
                    is_safe: true,
                    admin_confirmed: true,
                };
                match peer.sync(&payload, caller.credential.as_deref()).await {
                    Ok(ack) => PeerSyncStatus::Synced {
                        attempts: ack.attempts,
                    },
                    Err(e) => {
                        // Degraded success: the reclamation and registry are
                        // committed; flag the inconsistency instead of rolling back
                        warn!(
                            id = %rec.id,
                            error = %e,
                            "Peer sync failed; local verdict stands, peer may be stale"
                        );
                        PeerSyncStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
            None => PeerSyncStatus::Skipped,
        };

        let notification = NotificationDoc::new(
            rec.threat_type.clone(),
            rec.details.clone(),
            rec.user.clone(),
            true,
            true,
        );

        let notified = self.notifications.insert(notification.clone()).await?;
        if notified {
            self.hub.publish(notification);
        }

        Ok(ConfirmOutcome {
            reclamation: rec,
            safe_item: Some(safe_item),
            notified,
            peer_sync,
        })
    }

    /// Record an externally produced notification and publish it when new.
    ///
    /// This is the ingest path for collaborators that hand the core a
    /// ready-made notification (e.g. a scan front-end raising an alert).
    pub async fn ingest_notification(&self, notification: NotificationDoc) -> Result<bool> {
        let stored = self.notifications.insert(notification.clone()).await?;
        if stored {
            self.hub.publish(notification);
        }
        Ok(stored)
    }

    /// Operator queue: unprocessed reclamations in submission order
    pub async fn pending_reclamations(&self) -> Result<Vec<ReclamationDoc>> {
        self.reclamations.list_pending().await
    }

    /// Dashboard list: unresolved alerts in insertion order
    pub async fn unresolved_alerts(&self) -> Result<Vec<NotificationDoc>> {
        self.notifications.list_unresolved().await
    }

    /// Full append-only notification history
    pub async fn alert_history(&self) -> Result<Vec<NotificationDoc>> {
        self.notifications.list_all().await
    }

    /// Verdict lookup for peer consumers
    pub async fn safe_item(
        &self,
        item_hash: &str,
        threat_type: &str,
    ) -> Result<Option<SafeItemDoc>> {
        self.registry.lookup(item_hash, threat_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerTransport;
    use crate::store::{
        MemoryNotificationStore, MemoryReclamationStore, MemorySafeItemRegistry,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingTransport {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl PeerTransport for CountingTransport {
        async fn push(
            &self,
            _payload: &VerdictPayload,
            _credential: Option<&str>,
        ) -> std::result::Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("unreachable".to_string())
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        workflow: ReclamationWorkflow,
        transport: Arc<CountingTransport>,
        hub: Arc<AlertHub>,
    }

    fn fixture(peer_fails: bool) -> Fixture {
        let transport = Arc::new(CountingTransport {
            calls: AtomicU32::new(0),
            fail: peer_fails,
        });
        let peer = PeerSyncClient::with_transport(transport.clone())
            .with_retry_delay(Duration::from_millis(1));
        let hub = Arc::new(AlertHub::new(64));

        let workflow = ReclamationWorkflow::new(
            Arc::new(MemoryReclamationStore::new()),
            Arc::new(MemorySafeItemRegistry::new()),
            Arc::new(MemoryNotificationStore::new()),
            hub.clone(),
            Some(Arc::new(peer)),
        );

        Fixture {
            workflow,
            transport,
            hub,
        }
    }

    fn analyst() -> CallerIdentity {
        CallerIdentity {
            user: "a".to_string(),
            roles: vec!["analyst".to_string()],
            credential: Some("Bearer analyst-token".to_string()),
        }
    }

    fn operator() -> CallerIdentity {
        CallerIdentity {
            user: "op".to_string(),
            roles: vec!["admin".to_string()],
            credential: Some("Bearer op-token".to_string()),
        }
    }

    const DETAILS: &str = r#"{"url":"http://x.com/p/?q=1"}"#;

    #[tokio::test]
    async fn test_submit_derives_canonical_hash() {
        let f = fixture(false);
        let rec = f
            .workflow
            .submit(&analyst(), "Phishing", DETAILS)
            .await
            .unwrap();

        assert_eq!(
            rec.item_hash,
            canonical::item_hash("http://x.com/p").unwrap()
        );
        assert!(!rec.processed);
        assert_eq!(rec.user, "a");
    }

    #[tokio::test]
    async fn test_submit_duplicate_pending_rejected() {
        let f = fixture(false);
        f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();

        // Same logical URL, different query string: same item_hash
        let err = f
            .workflow
            .submit(&analyst(), "Phishing", r#"{"url":"http://x.com/p?q=2"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, VerdictError::DuplicatePending(_)));
    }

    #[tokio::test]
    async fn test_submit_invalid_locator_rejected() {
        let f = fixture(false);
        let err = f
            .workflow
            .submit(&analyst(), "Phishing", r#"{"url":"not a url"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, VerdictError::InvalidLocator(_)));
    }

    #[tokio::test]
    async fn test_confirm_safe_propagates_everywhere() {
        let f = fixture(false);
        let mut stream = f.hub.subscribe();

        let rec = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        let outcome = f.workflow.confirm(&operator(), &rec.id, true).await.unwrap();

        assert!(outcome.reclamation.processed);
        assert!(outcome.reclamation.safe);

        let safe_item = outcome.safe_item.unwrap();
        assert_eq!(
            safe_item.item_hash,
            canonical::item_hash("http://x.com/p").unwrap()
        );
        assert!(safe_item.is_safe);
        assert!(safe_item.admin_confirmed);

        // Peer called exactly once, with the verdict
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            outcome.peer_sync,
            PeerSyncStatus::Synced { attempts: 1 }
        ));

        // Exactly one notification recorded and published live
        assert!(outcome.notified);
        let history = f.workflow.alert_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].details_hash, canonical::details_hash(DETAILS));

        let live = stream.recv().await.unwrap();
        assert_eq!(live.details_hash, history[0].details_hash);
    }

    #[tokio::test]
    async fn test_confirm_unsafe_propagates_nothing() {
        let f = fixture(false);
        let rec = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        let outcome = f.workflow.confirm(&operator(), &rec.id, false).await.unwrap();

        assert!(outcome.reclamation.processed);
        assert!(!outcome.reclamation.safe);
        assert!(outcome.safe_item.is_none());
        assert!(!outcome.notified);
        assert!(matches!(outcome.peer_sync, PeerSyncStatus::Skipped));
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 0);
        assert!(f.workflow.alert_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_twice_second_fails_state_unchanged() {
        let f = fixture(false);
        let rec = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();

        f.workflow.confirm(&operator(), &rec.id, true).await.unwrap();
        let err = f
            .workflow
            .confirm(&operator(), &rec.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, VerdictError::AlreadyProcessed(_)));

        // The losing call changed nothing
        let stored = f
            .workflow
            .safe_item(
                &canonical::item_hash("http://x.com/p").unwrap(),
                "Phishing",
            )
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_safe);
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.workflow.alert_history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_unknown_id_not_found() {
        let f = fixture(false);
        let err = f
            .workflow
            .confirm(&operator(), "no-such-id", true)
            .await
            .unwrap_err();
        assert!(matches!(err, VerdictError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_peer_failure_degrades_but_still_publishes() {
        let f = fixture(true);
        let mut stream = f.hub.subscribe();

        let rec = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        let outcome = f.workflow.confirm(&operator(), &rec.id, true).await.unwrap();

        // All three attempts consumed
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 3);
        assert!(outcome.peer_sync.is_failed());

        // Local state committed and flagged, not rolled back
        assert!(outcome.reclamation.processed);
        assert!(outcome.reclamation.safe);
        assert!(outcome.safe_item.is_some());

        // Publish is independent of sync outcome
        assert!(outcome.notified);
        assert!(stream.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_notification_skips_publish() {
        let f = fixture(false);
        let mut stream = f.hub.subscribe();

        // Resolve a first reclamation for the item
        let rec = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        f.workflow.confirm(&operator(), &rec.id, true).await.unwrap();
        assert!(stream.recv().await.is_ok());

        // Identical details resubmitted and confirmed again: the
        // (details_hash, threat_type) gate suppresses the second event
        let rec2 = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        let outcome = f.workflow.confirm(&operator(), &rec2.id, true).await.unwrap();

        assert!(!outcome.notified);
        assert_eq!(f.workflow.alert_history().await.unwrap().len(), 1);
        assert!(
            stream.try_recv().is_err(),
            "duplicate must not be re-broadcast"
        );
    }

    #[tokio::test]
    async fn test_ingest_notification_publishes_once() {
        let f = fixture(false);
        let mut stream = f.hub.subscribe();

        let alert = NotificationDoc::new(
            "Phishing".to_string(),
            r#"{"url":"http://bad.example/x"}"#.to_string(),
            "scanner".to_string(),
            false,
            false,
        );

        assert!(f.workflow.ingest_notification(alert.clone()).await.unwrap());
        assert!(!f.workflow.ingest_notification(alert).await.unwrap());

        assert!(stream.recv().await.is_ok());
        assert!(stream.try_recv().is_err());

        let unresolved = f.workflow.unresolved_alerts().await.unwrap();
        assert_eq!(unresolved.len(), 1);
    }

    #[tokio::test]
    async fn test_resubmission_allowed_after_unsafe_verdict() {
        let f = fixture(false);
        let rec = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        f.workflow.confirm(&operator(), &rec.id, false).await.unwrap();

        // The pending slot reopened once the first reclamation went terminal
        let rec2 = f.workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        assert_ne!(rec.id, rec2.id);
    }

    #[tokio::test]
    async fn test_no_peer_configured_skips_sync() {
        let hub = Arc::new(AlertHub::new(16));
        let workflow = ReclamationWorkflow::new(
            Arc::new(MemoryReclamationStore::new()),
            Arc::new(MemorySafeItemRegistry::new()),
            Arc::new(MemoryNotificationStore::new()),
            hub,
            None,
        );

        let rec = workflow.submit(&analyst(), "Phishing", DETAILS).await.unwrap();
        let outcome = workflow.confirm(&operator(), &rec.id, true).await.unwrap();

        assert!(matches!(outcome.peer_sync, PeerSyncStatus::Skipped));
        assert!(outcome.safe_item.is_some());
        assert!(outcome.notified);
    }
}
