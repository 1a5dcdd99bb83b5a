//! Type-safe async gateway for aerial-vehicle telemetry and control.
//!
//! Airlink multiplexes a single vehicle link into a subscription-based
//! telemetry feed, blocking command/acknowledgement exchanges, and an
//! asynchronous camera frame stream.
//!
//! # Features
//!
//! - **Subscription packages**: group topics at a chosen frequency, with
//!   bandwidth negotiation at subscribe time and deterministic id ownership
//! - **Blocking commands**: takeoff, landing, homing, and position offsets
//!   with explicit per-call timeouts; a timed-out call always returns
//! - **Camera frames**: tear-free latest-frame hand-off from the stream
//!   receiver to any number of reader threads
//! - **Transport-agnostic**: serial, UDP, or simulated links plug in behind
//!   two small async traits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use airlink::{GatewayConfig, PackageDef, StreamRate, Topic, Vehicle};
//! use airlink::link::{LinkEvent, LinkRx, LinkTx, TaggedRequest};
//! use futures::StreamExt;
//! use std::time::Duration;
//!
//! struct SerialTx; // wraps the outbound half of your transport
//! struct SerialRx; // wraps the inbound half
//!
//! #[async_trait::async_trait]
//! impl LinkTx for SerialTx {
//!     async fn send(&self, frame: TaggedRequest) -> airlink::Result<()> {
//!         todo!("serialize and write to the transport")
//!     }
//! }
//!
//! #[async_trait::async_trait]
//! impl LinkRx for SerialRx {
//!     async fn next_event(&mut self) -> airlink::Result<Option<LinkEvent>> {
//!         todo!("read and decode the next inbound event")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> airlink::Result<()> {
//!     let config = GatewayConfig::new(1024991, "app-key");
//!     let vehicle = Vehicle::connect(config, SerialTx, SerialRx).await?;
//!
//!     vehicle.verify(Duration::from_secs(1)).await?;
//!     let package = PackageDef {
//!         id: 0,
//!         frequency_hz: 50,
//!         topics: vec![Topic::Quaternion, Topic::GpsFused],
//!         send_timestamp: false,
//!     };
//!     vehicle.set_up_subscription(package, Duration::from_secs(1)).await?;
//!
//!     let mut frames = vehicle.package_stream(0, StreamRate::Max(10))?;
//!     while let Some(frame) = frames.next().await {
//!         println!("{:?}", frame.values);
//!     }
//!     Ok(())
//! }
//! ```

// Core components
pub mod callbacks;
pub mod camera;
pub mod command;
mod config;
pub mod driver;
mod error;
pub mod payload;
mod setup;
pub mod subscription;
pub mod types;
pub mod vehicle;

// Transport seam and stream utilities
pub mod link;
pub mod stream;

// In-process link simulation, shared with benches
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Core exports
pub use config::{DEFAULT_ACM_BAUDRATE, GatewayConfig};
pub use error::{GatewayError, Result};
pub use types::*;

// Component exports
pub use callbacks::{Callback, CallbackEvent, CallbackKey, CallbackRegistry};
pub use camera::{CameraFrameBuffer, CameraImage, CameraView, StreamCodec};
pub use command::{
    AvoidanceKind, C_EARTH, CommandGateway, DEG2RAD, local_offset_from_gps_offset, to_euler_angle,
};
pub use setup::LinkSetup;
pub use subscription::{PackageCallback, PackageDef, PackageState, SubscriptionManager};

// Main API exports
pub use vehicle::{MAX_COMPANION_PAYLOAD, Vehicle};
