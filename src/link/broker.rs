//! Request/acknowledgement correlation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{trace, warn};

use super::{LinkRequest, LinkTx, TaggedRequest};
use crate::types::AckResult;
use crate::{GatewayError, Result};

/// Correlates outbound requests with inbound acknowledgements.
///
/// Every blocking call in the gateway funnels through [`request`]: the caller
/// parks on a oneshot until the receiver task delivers the matching ack or
/// the deadline elapses. The broker never retries; a timed-out request is
/// deregistered and its late ack, if any, is dropped.
///
/// [`request`]: RequestBroker::request
pub struct RequestBroker {
    tx: Box<dyn LinkTx>,
    next_seq: AtomicU32,
    pending: Mutex<HashMap<u32, oneshot::Sender<AckResult>>>,
}

impl RequestBroker {
    pub fn new(tx: impl LinkTx) -> Self {
        RequestBroker {
            tx: Box::new(tx),
            next_seq: AtomicU32::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Send `request` and wait for its acknowledgement or `timeout`.
    ///
    /// On timeout the pending entry is removed and the outcome of the
    /// in-flight request is unknown to the caller.
    pub async fn request(&self, request: LinkRequest, timeout: Duration) -> Result<AckResult> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (ack_tx, ack_rx) = oneshot::channel();
        self.lock_pending().insert(seq, ack_tx);
        trace!(seq, ?timeout, "sending request");

        if let Err(e) = self.tx.send(TaggedRequest { seq, request }).await {
            self.lock_pending().remove(&seq);
            return Err(e);
        }

        match tokio::time::timeout(timeout, ack_rx).await {
            Ok(Ok(result)) => {
                trace!(seq, outcome = ?result.outcome, "acknowledged");
                Ok(result)
            }
            // The receiver task dropped the sender without completing: the
            // link ended while we were parked.
            Ok(Err(_)) => Err(GatewayError::LinkClosed),
            Err(_) => {
                self.lock_pending().remove(&seq);
                warn!(seq, ?timeout, "request timed out, outcome unknown");
                Err(GatewayError::link_timeout(timeout))
            }
        }
    }

    /// Fire-and-forget send for exchanges the vehicle does not acknowledge.
    pub async fn send(&self, request: LinkRequest) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.tx.send(TaggedRequest { seq, request }).await
    }

    /// Deliver an inbound acknowledgement to the parked caller, if any.
    ///
    /// Called from the receiver task. Acks with no pending entry belong to
    /// requests that already timed out and are dropped.
    pub fn complete(&self, seq: u32, result: AckResult) {
        match self.lock_pending().remove(&seq) {
            Some(ack_tx) => {
                // Caller may have been cancelled between timeout and removal.
                let _ = ack_tx.send(result);
            }
            None => trace!(seq, "dropping ack for unknown or timed-out request"),
        }
    }

    /// Number of requests currently awaiting an acknowledgement.
    pub fn pending_requests(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u32, oneshot::Sender<AckResult>>> {
        self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RequestBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBroker").field("pending", &self.pending_requests()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLink;
    use crate::types::AckOutcome;

    #[tokio::test]
    async fn ack_resolves_parked_request() {
        let (tx, mut rx, _remote) = MockLink::auto_ack().split();
        let broker = std::sync::Arc::new(RequestBroker::new(tx));

        let pump = {
            let broker = broker.clone();
            tokio::spawn(async move {
                use crate::link::{LinkEvent, LinkRx};
                while let Ok(Some(event)) = rx.next_event().await {
                    if let LinkEvent::Ack { seq, result } = event {
                        broker.complete(seq, result);
                    }
                }
            })
        };

        let result =
            broker.request(LinkRequest::Verify, Duration::from_secs(1)).await.expect("ack");
        assert!(result.outcome.is_success());
        assert_eq!(broker.pending_requests(), 0);
        pump.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_leaves_pending_table_clean() {
        let (tx, _rx, _remote) = MockLink::silent().split();
        let broker = RequestBroker::new(tx);

        let err = broker
            .request(LinkRequest::Verify, Duration::from_millis(200))
            .await
            .expect_err("no ack was scripted");
        assert!(matches!(err, GatewayError::LinkTimeout { .. }));
        assert_eq!(broker.pending_requests(), 0);
    }

    #[tokio::test]
    async fn late_ack_after_timeout_is_dropped() {
        let (tx, _rx, _remote) = MockLink::silent().split();
        let broker = RequestBroker::new(tx);

        let err = broker
            .request(LinkRequest::Verify, Duration::from_millis(10))
            .await
            .expect_err("timeout");
        assert!(matches!(err, GatewayError::LinkTimeout { .. }));

        // Ack arriving after the deadline must not panic or resurrect anything.
        broker.complete(0, AckResult::success());
        assert_eq!(broker.pending_requests(), 0);
    }
}
