//! Transport seam between the gateway and the physical vehicle link.
//!
//! The gateway never touches wire encoding: requests are typed values handed
//! to a [`LinkTx`] implementation, and inbound traffic arrives as decoded
//! [`LinkEvent`]s from a [`LinkRx`] implementation. A serial, UDP, or
//! simulated transport plugs in behind these two traits.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;
use crate::camera::{CameraImage, CameraView, StreamCodec};
use crate::command::AvoidanceKind;
use crate::payload::{CameraOp, GimbalOp, PayloadIndex};
use crate::types::{AckResult, BroadcastFrame, MoveOffset, Topic};

mod broker;

pub use broker::RequestBroker;

/// Flight-control actions issued through the command gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightCommand {
    GoHome,
    Takeoff,
    Land,
    MoveByOffset { offset: MoveOffset },
    SetHomeLocation,
    SetHomeAltitude { meters: u16 },
}

/// Requests the gateway can issue over the link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkRequest {
    /// Activate the link with registered application credentials.
    Activate { app_id: u32, app_key: String },
    /// Query firmware and hardware identification.
    QueryVersion,
    /// One-time telemetry protocol/capability negotiation.
    Verify,
    /// Define a subscription package.
    DefinePackage { id: u8, frequency_hz: u16, topics: Vec<Topic>, send_timestamp: bool },
    /// Start streaming a defined package.
    StartPackage { id: u8 },
    /// Stop streaming a package.
    RemovePackage { id: u8 },
    /// Flight-control action.
    Flight(FlightCommand),
    /// Camera parameter or shooting operation, forwarded untranslated.
    Camera { index: PayloadIndex, op: CameraOp },
    /// Gimbal operation, forwarded untranslated.
    Gimbal { index: PayloadIndex, op: GimbalOp },
    /// Toggle an obstacle-avoidance function.
    Avoidance { kind: AvoidanceKind, enable: bool },
    /// Start the camera stream for one codec and view.
    StartStream { codec: StreamCodec, view: CameraView },
    /// Stop the camera stream for one codec and view.
    StopStream { codec: StreamCodec, view: CameraView },
    /// Length-prefixed blob for the mobile companion client.
    MobileData(Bytes),
    /// Length-prefixed blob for the payload companion client.
    PayloadData(Bytes),
}

/// A request tagged with the sequence number its acknowledgement must echo.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRequest {
    pub seq: u32,
    pub request: LinkRequest,
}

/// Inbound traffic decoded by the link layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Acknowledgement of the request tagged `seq`.
    Ack { seq: u32, result: AckResult },
    /// Telemetry frame of an active subscription package.
    PackageData { id: u8, payload: Bytes },
    /// Broadcast telemetry at the vehicle's default rates.
    Broadcast(BroadcastFrame),
    /// Decoded camera image from the stream receiver.
    CameraImage(CameraImage),
    /// Raw camera bitstream chunk.
    CameraRaw(Bytes),
    /// Blob sent by the mobile companion client.
    FromMobile(Bytes),
    /// Blob sent by the payload companion client.
    FromPayload(Bytes),
}

/// Sending half of the vehicle link.
///
/// Implementations serialize and transmit the request; delivery of the
/// matching [`LinkEvent::Ack`] happens on the receiving half.
#[async_trait]
pub trait LinkTx: Send + Sync + 'static {
    async fn send(&self, frame: TaggedRequest) -> Result<()>;
}

/// Receiving half of the vehicle link.
///
/// Returns:
/// - `Ok(Some(event))` - next decoded inbound event
/// - `Ok(None)` - link closed (normal termination)
/// - `Err(e)` - transient receive error
#[async_trait]
pub trait LinkRx: Send + 'static {
    async fn next_event(&mut self) -> Result<Option<LinkEvent>>;
}
