//! In-process link simulation for tests and benchmarks.
//!
//! [`MockLink`] scripts the vehicle side of the transport: a handler decides
//! how each outbound request is acknowledged, and [`MockRemote`] injects
//! unsolicited inbound traffic (telemetry, camera frames, companion blobs).

#![cfg(any(test, feature = "benchmark"))]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;
use crate::link::{LinkEvent, LinkRequest, LinkRx, LinkTx, RequestBroker, TaggedRequest};
use crate::types::{AckData, AckResult, FirmwareVersion, LinkCapabilities, TopicValue};

/// Telemetry bandwidth budget the mock link negotiates during verify.
pub const MOCK_BANDWIDTH_BYTES_PER_SEC: u32 = 6000;

/// Scripted reaction to one outbound request.
pub enum MockResponse {
    /// Acknowledge immediately.
    Ack(AckResult),
    /// Acknowledge after a delay.
    AckAfter(Duration, AckResult),
    /// Never acknowledge; the caller times out.
    Silence,
}

impl MockResponse {
    /// The acknowledgement a healthy vehicle would send for `request`.
    pub fn default_ack(request: &LinkRequest) -> MockResponse {
        MockResponse::Ack(default_ack_result(request))
    }
}

fn default_ack_result(request: &LinkRequest) -> AckResult {
    match request {
        LinkRequest::Verify => AckResult::success_with(AckData::Capabilities(LinkCapabilities {
            protocol_version: 1,
            max_bandwidth_bytes_per_sec: MOCK_BANDWIDTH_BYTES_PER_SEC,
        })),
        LinkRequest::QueryVersion => AckResult::success_with(AckData::Version {
            firmware: FirmwareVersion { major: 4, minor: 1, patch: 0, build: 3 },
            hardware: "SIM300".to_string(),
        }),
        _ => AckResult::success(),
    }
}

type Handler = Arc<dyn Fn(&LinkRequest) -> MockResponse + Send + Sync>;

/// Scripted in-process link.
pub struct MockLink {
    handler: Handler,
}

impl MockLink {
    /// Acknowledge every request the way a healthy vehicle would.
    pub fn auto_ack() -> Self {
        MockLink { handler: Arc::new(MockResponse::default_ack) }
    }

    /// Never acknowledge anything; every blocking call times out.
    pub fn silent() -> Self {
        MockLink { handler: Arc::new(|_| MockResponse::Silence) }
    }

    /// Script the vehicle's reaction per request.
    pub fn with_handler(
        handler: impl Fn(&LinkRequest) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        MockLink { handler: Arc::new(handler) }
    }

    /// Split into the transport halves plus a handle for the far side.
    pub fn split(self) -> (MockTx, MockRx, MockRemote) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let tx = MockTx { handler: self.handler, events: events_tx.clone(), log: log.clone() };
        (tx, MockRx { events: events_rx }, MockRemote { events: events_tx, log })
    }
}

/// Sending half handed to the gateway.
pub struct MockTx {
    handler: Handler,
    events: mpsc::UnboundedSender<LinkEvent>,
    log: Arc<Mutex<Vec<LinkRequest>>>,
}

#[async_trait]
impl LinkTx for MockTx {
    async fn send(&self, frame: TaggedRequest) -> Result<()> {
        self.log.lock().unwrap().push(frame.request.clone());
        match (self.handler)(&frame.request) {
            MockResponse::Ack(result) => {
                let _ = self.events.send(LinkEvent::Ack { seq: frame.seq, result });
            }
            MockResponse::AckAfter(delay, result) => {
                let events = self.events.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(LinkEvent::Ack { seq: frame.seq, result });
                });
            }
            MockResponse::Silence => {}
        }
        Ok(())
    }
}

/// Receiving half handed to the gateway.
pub struct MockRx {
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl LinkRx for MockRx {
    async fn next_event(&mut self) -> Result<Option<LinkEvent>> {
        // Closes when every sender (MockTx and MockRemote) is gone.
        Ok(self.events.recv().await)
    }
}

/// Handle playing the vehicle side of the link.
pub struct MockRemote {
    events: mpsc::UnboundedSender<LinkEvent>,
    log: Arc<Mutex<Vec<LinkRequest>>>,
}

impl MockRemote {
    /// Inject an unsolicited inbound event.
    pub fn inject(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    /// Every request the gateway has sent so far, in order.
    pub fn sent_requests(&self) -> Vec<LinkRequest> {
        self.log.lock().unwrap().clone()
    }
}

/// Forward mock acknowledgements straight into a broker, for tests that
/// exercise a component below the driver.
pub fn pump_acks(mut rx: MockRx, broker: Arc<RequestBroker>) {
    tokio::spawn(async move {
        while let Ok(Some(event)) = rx.next_event().await {
            if let LinkEvent::Ack { seq, result } = event {
                broker.complete(seq, result);
            }
        }
    });
}

/// Build the wire payload of one package frame.
pub fn encode_package_frame(timestamp_us: Option<u64>, values: &[TopicValue]) -> Bytes {
    let mut out = Vec::new();
    if let Some(ts) = timestamp_us {
        out.extend_from_slice(&ts.to_le_bytes());
    }
    for value in values {
        value.encode(&mut out);
    }
    Bytes::from(out)
}
