//! Peer-Sync Client - push confirmed verdicts to the remote authority
//!
//! One push per safe confirmation, carrying the original caller's credential
//! for the peer to re-validate. Any failure short of success (non-2xx or
//! transport error) consumes one of a fixed number of attempts with a fixed
//! inter-attempt delay; after exhaustion the error surfaces as
//! `VerdictError::Sync`. The caller's local state is already committed at
//! that point and is not rolled back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{Result, VerdictError};

/// Fixed attempt bound; changing this requires re-verifying downstream
/// expectations on the peer side
pub const SYNC_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts
pub const SYNC_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Verdict payload pushed to the peer authority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerdictPayload {
    pub item_hash: String,
    pub threat_type: String,
    pub is_safe: bool,
    pub admin_confirmed: bool,
}

/// Acknowledgement of a successful sync
#[derive(Debug, Clone)]
pub struct SyncAck {
    /// Which attempt succeeded (1-based)
    pub attempts: u32,
}

/// One push attempt to the peer authority
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Deliver the payload once. `Err` describes why this attempt failed.
    async fn push(
        &self,
        payload: &VerdictPayload,
        credential: Option<&str>,
    ) -> std::result::Result<(), String>;
}

/// HTTP transport posting verdicts to the peer's verdict endpoint
pub struct HttpPeerTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPeerTransport {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerdictError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn push(
        &self,
        payload: &VerdictPayload,
        credential: Option<&str>,
    ) -> std::result::Result<(), String> {
        let mut request = self.client.post(&self.endpoint).json(payload);

        // Credential is passed through verbatim, never re-derived;
        // the peer re-validates it itself
        if let Some(credential) = credential {
            request = request.header("Authorization", credential);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(format!("peer returned {}", resp.status())),
            Err(e) => Err(format!("transport error: {}", e)),
        }
    }
}

/// Peer-sync client wrapping a transport with the bounded retry policy
pub struct PeerSyncClient {
    transport: Arc<dyn PeerTransport>,
    attempts: u32,
    retry_delay: Duration,
}

impl PeerSyncClient {
    /// Client pushing to the given HTTP endpoint
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpPeerTransport::new(
            endpoint, timeout,
        )?)))
    }

    /// Client over an arbitrary transport (tests use this with mocks)
    pub fn with_transport(transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            transport,
            attempts: SYNC_ATTEMPTS,
            retry_delay: SYNC_RETRY_DELAY,
        }
    }

    /// Shrink the inter-attempt delay (tests only; the production delay is
    /// fixed by [`SYNC_RETRY_DELAY`])
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Push the verdict, retrying on any failure up to the attempt bound.
    pub async fn sync(
        &self,
        payload: &VerdictPayload,
        credential: Option<&str>,
    ) -> Result<SyncAck> {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match self.transport.push(payload, credential).await {
                Ok(()) => {
                    debug!(
                        item_hash = %payload.item_hash,
                        threat_type = %payload.threat_type,
                        attempt,
                        "Verdict synced to peer authority"
                    );
                    return Ok(SyncAck { attempts: attempt });
                }
                Err(e) => {
                    warn!(
                        item_hash = %payload.item_hash,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Peer sync attempt failed"
                    );
                    last_error = e;
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(VerdictError::Sync(format!(
            "{} attempts exhausted: {}",
            self.attempts, last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedTransport {
        calls: AtomicU32,
        /// Succeed on the nth call (1-based); 0 means never succeed
        succeed_on: u32,
    }

    impl ScriptedTransport {
        fn new(succeed_on: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                succeed_on,
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerTransport for ScriptedTransport {
        async fn push(
            &self,
            _payload: &VerdictPayload,
            _credential: Option<&str>,
        ) -> std::result::Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.succeed_on != 0 && call >= self.succeed_on {
                Ok(())
            } else {
                Err(format!("scripted failure on call {}", call))
            }
        }
    }

    fn payload() -> VerdictPayload {
        VerdictPayload {
            item_hash: "h1".to_string(),
            threat_type: "Phishing".to_string(),
            is_safe: true,
            admin_confirmed: true,
        }
    }

    #[tokio::test]
    async fn test_sync_succeeds_first_attempt() {
        let transport = ScriptedTransport::new(1);
        let client = PeerSyncClient::with_transport(transport.clone())
            .with_retry_delay(Duration::from_millis(1));

        let ack = client.sync(&payload(), Some("Bearer tok")).await.unwrap();
        assert_eq!(ack.attempts, 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_retries_then_succeeds() {
        let transport = ScriptedTransport::new(3);
        let client = PeerSyncClient::with_transport(transport.clone())
            .with_retry_delay(Duration::from_millis(1));

        let ack = client.sync(&payload(), None).await.unwrap();
        assert_eq!(ack.attempts, 3);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_sync_exhausts_exactly_three_attempts() {
        let transport = ScriptedTransport::new(0);
        let client = PeerSyncClient::with_transport(transport.clone())
            .with_retry_delay(Duration::from_millis(1));

        let err = client.sync(&payload(), None).await.unwrap_err();
        assert!(matches!(err, VerdictError::Sync(_)));
        assert_eq!(transport.call_count(), SYNC_ATTEMPTS);
    }

    #[test]
    fn test_payload_wire_shape() {
        let json = serde_json::to_value(payload()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "item_hash": "h1",
                "threat_type": "Phishing",
                "is_safe": true,
                "admin_confirmed": true,
            })
        );
    }
}
