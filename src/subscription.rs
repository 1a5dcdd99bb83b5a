//! Subscription-package lifecycle.
//!
//! A *package* groups up to [`MAX_TOPICS_PER_PACKAGE`] topics sampled at one
//! shared frequency. Each of the [`MAX_PACKAGES`] package ids walks the state
//! machine `Unbound -> Requested -> Verified -> Active -> TearingDown ->
//! Unbound`; `Unbound` is represented by the absence of a table entry.
//!
//! Id reservation happens under the table lock before any link I/O, so two
//! racing subscribe calls resolve deterministically: the first writer owns
//! the id and the second observes [`GatewayError::DuplicatePackage`]. A
//! package is only visible to dispatch once it reaches `Active`, never in a
//! partially-built state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, trace, warn};

use crate::link::{LinkRequest, RequestBroker};
use crate::stream::ThrottleExt;
use crate::types::{
    AckData, AckOutcome, AckResult, LinkCapabilities, MAX_PACKAGES, MAX_TOPICS_PER_PACKAGE,
    PackageFrame, Topic, read_u64,
};
use crate::{GatewayError, Result};

/// Definition of a subscription package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDef {
    /// Package id, `0..MAX_PACKAGES`. Unique while the package is defined.
    pub id: u8,
    /// Sampling frequency shared by every topic in the package.
    pub frequency_hz: u16,
    /// Topics in dispatch order.
    pub topics: Vec<Topic>,
    /// Prefix each frame with the vehicle clock at sampling time.
    pub send_timestamp: bool,
}

impl PackageDef {
    /// Payload bytes of one frame of this package.
    pub fn frame_len(&self) -> usize {
        let timestamp = if self.send_timestamp { 8 } else { 0 };
        timestamp + self.topics.iter().map(|t| t.payload_len()).sum::<usize>()
    }

    /// Telemetry bandwidth this package consumes, in bytes per second.
    pub fn bandwidth_bytes_per_sec(&self) -> u64 {
        self.frame_len() as u64 * self.frequency_hz as u64
    }
}

/// Lifecycle state of a package id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Id is free; no package owns it.
    Unbound,
    /// Definition reserved locally, acknowledgement outstanding.
    Requested,
    /// Definition acknowledged; not streaming.
    Verified,
    /// Streaming; frames reach dispatch.
    Active,
    /// Removal in flight.
    TearingDown,
}

/// Decode-and-dispatch hook invoked on every inbound frame of a package.
pub type PackageCallback = Arc<dyn Fn(&PackageFrame) + Send + Sync>;

struct Entry {
    def: PackageDef,
    state: PackageState,
    frames: Arc<watch::Sender<Option<Arc<PackageFrame>>>>,
}

struct Inner {
    capabilities: Option<LinkCapabilities>,
    packages: HashMap<u8, Entry>,
}

/// Owns the telemetry package lifecycle.
pub struct SubscriptionManager {
    broker: Arc<RequestBroker>,
    inner: Mutex<Inner>,
    // Unpack hooks live outside the package table so a hook can be
    // registered before its package exists and survives redefinition.
    unpack: Mutex<HashMap<u8, PackageCallback>>,
}

impl SubscriptionManager {
    pub fn new(broker: Arc<RequestBroker>) -> Self {
        SubscriptionManager {
            broker,
            inner: Mutex::new(Inner { capabilities: None, packages: HashMap::new() }),
            unpack: Mutex::new(HashMap::new()),
        }
    }

    /// One-time negotiation of protocol version and capabilities.
    ///
    /// Must succeed before any package is requested. Idempotent: repeat calls
    /// return the cached capabilities, and a timed-out attempt leaves state
    /// unchanged so the caller can simply retry.
    pub async fn verify(&self, timeout: Duration) -> Result<LinkCapabilities> {
        if let Some(caps) = self.lock_inner().capabilities {
            return Ok(caps);
        }

        let result = self.broker.request(LinkRequest::Verify, timeout).await?;
        let result = subscription_ack(result, timeout)?;
        let caps = match result.data {
            Some(AckData::Capabilities(caps)) => caps,
            _ => {
                return Err(GatewayError::subscription_rejected(
                    "verify acknowledgement carried no capabilities",
                ));
            }
        };

        info!(
            protocol_version = caps.protocol_version,
            bandwidth = caps.max_bandwidth_bytes_per_sec,
            "telemetry link verified"
        );
        self.lock_inner().capabilities = Some(caps);
        Ok(caps)
    }

    /// Negotiated capabilities, if [`verify`](Self::verify) has succeeded.
    pub fn capabilities(&self) -> Option<LinkCapabilities> {
        self.lock_inner().capabilities
    }

    /// Define and start a package: reserve the id, send the definition,
    /// start streaming.
    ///
    /// Rejection or timeout at any step rolls the id back to `Unbound`; the
    /// request may still be in flight, so callers re-check state before
    /// retrying after a timeout.
    pub async fn set_up_subscription(&self, def: PackageDef, timeout: Duration) -> Result<()> {
        validate_def(&def)?;

        {
            let mut inner = self.lock_inner();
            let caps = inner.capabilities.ok_or(GatewayError::LinkNotVerified)?;

            let budget = caps.max_bandwidth_bytes_per_sec as u64;
            let demand = def.bandwidth_bytes_per_sec();
            if demand > budget {
                return Err(GatewayError::invalid_package(format!(
                    "package needs {demand} B/s but the link budget is {budget} B/s"
                )));
            }

            // First writer wins: reserving under the lock makes the loser of
            // a subscribe race observe DuplicatePackage deterministically.
            if inner.packages.contains_key(&def.id) {
                return Err(GatewayError::DuplicatePackage { id: def.id });
            }
            let (frames, _) = watch::channel(None);
            inner.packages.insert(
                def.id,
                Entry { def: def.clone(), state: PackageState::Requested, frames: Arc::new(frames) },
            );
        }

        debug!(id = def.id, freq = def.frequency_hz, topics = def.topics.len(), "defining package");
        let define = LinkRequest::DefinePackage {
            id: def.id,
            frequency_hz: def.frequency_hz,
            topics: def.topics.clone(),
            send_timestamp: def.send_timestamp,
        };
        if let Err(e) = self.acked(define, timeout).await {
            self.release(def.id);
            return Err(e);
        }
        self.set_state(def.id, PackageState::Verified);

        if let Err(e) = self.acked(LinkRequest::StartPackage { id: def.id }, timeout).await {
            self.release(def.id);
            return Err(e);
        }
        self.set_state(def.id, PackageState::Active);
        info!(id = def.id, freq = def.frequency_hz, "package active");
        Ok(())
    }

    /// Start streaming an already-defined package.
    ///
    /// A package that is already `Active` succeeds without link traffic.
    pub async fn start_package(&self, id: u8, timeout: Duration) -> Result<()> {
        match self.state_of(id) {
            PackageState::Active => return Ok(()),
            PackageState::Verified => {}
            PackageState::Unbound => return Err(GatewayError::UnknownPackage { id }),
            state => {
                return Err(GatewayError::subscription_rejected(format!(
                    "package {id} is {state:?}, not startable"
                )));
            }
        }

        self.acked(LinkRequest::StartPackage { id }, timeout).await?;
        self.set_state(id, PackageState::Active);
        debug!(id, "package started");
        Ok(())
    }

    /// Stop streaming a package while keeping its definition.
    ///
    /// Idempotent teardown semantics: an `Unbound` id or an already-inactive
    /// package is a no-op success.
    pub async fn remove_package(&self, id: u8, timeout: Duration) -> Result<()> {
        match self.state_of(id) {
            PackageState::Unbound | PackageState::Verified => return Ok(()),
            // A previous removal timed out; retry the exchange.
            PackageState::Active | PackageState::TearingDown => {}
            PackageState::Requested => {
                return Err(GatewayError::subscription_rejected(format!(
                    "package {id} is still being requested"
                )));
            }
        }

        self.set_state(id, PackageState::TearingDown);
        match self.acked(LinkRequest::RemovePackage { id }, timeout).await {
            Ok(_) => {
                self.set_state(id, PackageState::Verified);
                debug!(id, "package stopped");
                Ok(())
            }
            Err(e @ GatewayError::LinkTimeout { .. }) => {
                // Outcome unknown; stay in TearingDown so a retry re-sends.
                Err(e)
            }
            Err(e) => {
                self.set_state(id, PackageState::Active);
                Err(e)
            }
        }
    }

    /// Remove a package and release its id for reuse.
    ///
    /// Safe to call twice and on ids that were never subscribed.
    pub async fn teardown_subscription(&self, id: u8, timeout: Duration) -> Result<()> {
        if self.state_of(id) == PackageState::Unbound {
            return Ok(());
        }

        self.set_state(id, PackageState::TearingDown);
        match self.acked(LinkRequest::RemovePackage { id }, timeout).await {
            Ok(_) => {}
            Err(GatewayError::SubscriptionRejected { reason }) => {
                // The vehicle no longer knows the package; release locally.
                warn!(id, %reason, "vehicle rejected removal, releasing id anyway");
            }
            Err(e) => return Err(e),
        }
        self.release(id);
        info!(id, "package torn down");
        Ok(())
    }

    /// Attach the decode-and-dispatch hook for `id`, replacing and
    /// discarding any previous hook for the same id.
    pub fn register_user_package_unpack_callback(&self, id: u8, callback: PackageCallback) {
        self.lock_unpack().insert(id, callback);
    }

    /// Current lifecycle state of `id`.
    pub fn state_of(&self, id: u8) -> PackageState {
        self.lock_inner().packages.get(&id).map_or(PackageState::Unbound, |e| e.state)
    }

    /// Decoded frames of package `id` as a stream, latest frame wins when the
    /// consumer lags.
    ///
    /// The stream ends when the package is torn down.
    pub fn package_stream(
        &self,
        id: u8,
        rate: crate::types::StreamRate,
    ) -> Result<BoxStream<'static, Arc<PackageFrame>>> {
        let (receiver, frequency_hz) = {
            let inner = self.lock_inner();
            let entry = inner.packages.get(&id).ok_or(GatewayError::UnknownPackage { id })?;
            (entry.frames.subscribe(), entry.def.frequency_hz)
        };

        // The watch channel yields its current value immediately, which is
        // None until the first frame lands. Skip leading Nones, then treat
        // the next None (sender dropped at teardown) as end of stream.
        let frames = WatchStream::new(receiver)
            .skip_while(|opt| {
                let is_none = opt.is_none();
                async move { is_none }
            })
            .take_while(|opt| {
                let is_some = opt.is_some();
                async move { is_some }
            })
            .filter_map(|opt| async move { opt });

        match rate.throttle_interval(frequency_hz as f64) {
            None => Ok(frames.boxed()),
            Some(interval) => Ok(frames.throttle(interval).boxed()),
        }
    }

    /// Decode and dispatch one inbound package frame. Receiver-task call.
    ///
    /// Frames for packages that are not `Active` are dropped: a package being
    /// defined or torn down is never visible to dispatch.
    pub fn handle_package_data(&self, id: u8, payload: &Bytes) {
        let (def, frames) = {
            let inner = self.lock_inner();
            match inner.packages.get(&id) {
                Some(entry) if entry.state == PackageState::Active => {
                    (entry.def.clone(), entry.frames.clone())
                }
                _ => {
                    trace!(id, "dropping frame for inactive package");
                    return;
                }
            }
        };

        let frame = match decode_package(&def, payload) {
            Some(frame) => Arc::new(frame),
            None => {
                warn!(id, len = payload.len(), expected = def.frame_len(), "malformed frame");
                return;
            }
        };

        // Receivers may all be gone; the frame is still kept as the current
        // value for late subscribers.
        let _ = frames.send(Some(frame.clone()));

        let hook = self.lock_unpack().get(&id).cloned();
        if let Some(hook) = hook {
            hook(&frame);
        }
    }

    async fn acked(&self, request: LinkRequest, timeout: Duration) -> Result<AckResult> {
        let result = self.broker.request(request, timeout).await?;
        subscription_ack(result, timeout)
    }

    fn set_state(&self, id: u8, state: PackageState) {
        if let Some(entry) = self.lock_inner().packages.get_mut(&id) {
            trace!(id, ?state, "package state");
            entry.state = state;
        }
    }

    fn release(&self, id: u8) {
        // Dropping the entry drops the watch sender, ending package streams.
        self.lock_inner().packages.remove(&id);
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_unpack(&self) -> MutexGuard<'_, HashMap<u8, PackageCallback>> {
        self.unpack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock_inner();
        f.debug_struct("SubscriptionManager")
            .field("verified", &inner.capabilities.is_some())
            .field("packages", &inner.packages.len())
            .finish()
    }
}

fn validate_def(def: &PackageDef) -> Result<()> {
    if def.id as usize >= MAX_PACKAGES {
        return Err(GatewayError::invalid_package(format!(
            "package id {} out of range 0..{MAX_PACKAGES}",
            def.id
        )));
    }
    if def.topics.is_empty() {
        return Err(GatewayError::invalid_package("topic list is empty"));
    }
    if def.topics.len() > MAX_TOPICS_PER_PACKAGE {
        return Err(GatewayError::invalid_package(format!(
            "{} topics exceeds the grouping limit of {MAX_TOPICS_PER_PACKAGE}",
            def.topics.len()
        )));
    }
    if def.frequency_hz == 0 {
        return Err(GatewayError::invalid_package("frequency must be at least 1 Hz"));
    }
    let mut seen = std::collections::HashSet::new();
    for topic in &def.topics {
        if !seen.insert(topic) {
            return Err(GatewayError::invalid_package(format!("topic {topic:?} listed twice")));
        }
    }
    Ok(())
}

fn subscription_ack(result: AckResult, timeout: Duration) -> Result<AckResult> {
    match result.outcome {
        AckOutcome::Success => Ok(result),
        AckOutcome::Rejected { code } => {
            Err(GatewayError::subscription_rejected(format!("vehicle code {code:#x}")))
        }
        AckOutcome::Timeout => Err(GatewayError::link_timeout(timeout)),
        AckOutcome::Busy { retry_after } => Err(GatewayError::LinkBusy { retry_after }),
    }
}

fn decode_package(def: &PackageDef, payload: &[u8]) -> Option<PackageFrame> {
    if payload.len() != def.frame_len() {
        return None;
    }

    let mut offset = 0;
    let timestamp_us = if def.send_timestamp {
        let ts = read_u64(payload, 0)?;
        offset = 8;
        Some(ts)
    } else {
        None
    };

    let mut values = Vec::with_capacity(def.topics.len());
    for topic in &def.topics {
        let len = topic.payload_len();
        values.push(topic.decode(&payload[offset..offset + len])?);
        offset += len;
    }

    Some(PackageFrame { package_id: def.id, timestamp_us, values })
}
