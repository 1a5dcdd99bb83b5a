//! Scripted in-process link shared by the integration tests.

use std::sync::{Arc, Mutex};

use airlink::Result;
use airlink::link::{LinkEvent, LinkRequest, LinkRx, LinkTx, TaggedRequest};
use airlink::types::{
    AckData, AckResult, FirmwareVersion, LinkCapabilities, TopicValue,
};
use bytes::Bytes;
use tokio::sync::mpsc;

/// Bandwidth budget the scripted vehicle negotiates during verify.
pub const BANDWIDTH_BYTES_PER_SEC: u32 = 6000;

pub type Handler = Arc<dyn Fn(&LinkRequest) -> Option<AckResult> + Send + Sync>;

/// The acknowledgement a healthy vehicle sends for `request`.
pub fn healthy_ack(request: &LinkRequest) -> Option<AckResult> {
    let result = match request {
        LinkRequest::Verify => AckResult::success_with(AckData::Capabilities(LinkCapabilities {
            protocol_version: 1,
            max_bandwidth_bytes_per_sec: BANDWIDTH_BYTES_PER_SEC,
        })),
        LinkRequest::QueryVersion => AckResult::success_with(AckData::Version {
            firmware: FirmwareVersion { major: 4, minor: 1, patch: 0, build: 3 },
            hardware: "SIM300".to_string(),
        }),
        _ => AckResult::success(),
    };
    Some(result)
}

/// Handle for the vehicle side of a scripted link.
pub struct Remote {
    events: mpsc::UnboundedSender<LinkEvent>,
    log: Arc<Mutex<Vec<LinkRequest>>>,
}

impl Remote {
    pub fn inject(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    pub fn sent_requests(&self) -> Vec<LinkRequest> {
        self.log.lock().unwrap().clone()
    }
}

pub struct ScriptedTx {
    handler: Handler,
    events: mpsc::UnboundedSender<LinkEvent>,
    log: Arc<Mutex<Vec<LinkRequest>>>,
}

#[async_trait::async_trait]
impl LinkTx for ScriptedTx {
    async fn send(&self, frame: TaggedRequest) -> Result<()> {
        self.log.lock().unwrap().push(frame.request.clone());
        if let Some(result) = (self.handler)(&frame.request) {
            let _ = self.events.send(LinkEvent::Ack { seq: frame.seq, result });
        }
        Ok(())
    }
}

pub struct ScriptedRx {
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait::async_trait]
impl LinkRx for ScriptedRx {
    async fn next_event(&mut self) -> Result<Option<LinkEvent>> {
        Ok(self.events.recv().await)
    }
}

/// A link that answers every request per `handler`; `None` means silence.
pub fn scripted_link(handler: Handler) -> (ScriptedTx, ScriptedRx, Remote) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let log = Arc::new(Mutex::new(Vec::new()));
    let tx = ScriptedTx { handler, events: events_tx.clone(), log: log.clone() };
    (tx, ScriptedRx { events: events_rx }, Remote { events: events_tx, log })
}

/// A link scripted as a healthy vehicle.
pub fn healthy_link() -> (ScriptedTx, ScriptedRx, Remote) {
    scripted_link(Arc::new(healthy_ack))
}

/// Build the wire payload of one package frame.
pub fn encode_frame(timestamp_us: Option<u64>, values: &[TopicValue]) -> Bytes {
    let mut out = Vec::new();
    if let Some(ts) = timestamp_us {
        out.extend_from_slice(&ts.to_le_bytes());
    }
    for value in values {
        value.encode(&mut out);
    }
    Bytes::from(out)
}
