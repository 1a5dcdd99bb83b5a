//! Core types for telemetry and command data.
//!
//! This module provides the foundational data structures of the gateway:
//! - [`Topic`] and [`TopicValue`] map wire ids to fixed decoded record shapes
//! - [`PackageFrame`] and [`BroadcastFrame`] are the units flowing from the
//!   receiver task to consumers
//! - [`AckResult`] is the outcome of every acknowledged exchange
//! - [`ActivationInfo`] is the immutable post-startup activation snapshot
//! - [`StreamRate`] controls consumer-side delivery rates

mod ack;
mod activation;
mod frame;
mod rate;
mod records;
mod topic;

pub use ack::{AckData, AckOutcome, AckResult, FirmwareVersion, LinkCapabilities};
pub use activation::ActivationInfo;
pub use frame::{BroadcastFrame, PackageFrame, VehicleSnapshot};
pub use rate::StreamRate;
pub use records::{
    Battery, DisplayMode, FlightStatus, GimbalState, GlobalPosition, MoveOffset, Quaternion,
    RcInput, Vector3f,
};
pub use topic::{MAX_PACKAGES, MAX_TOPICS_PER_PACKAGE, Topic, TopicValue};

pub(crate) use records::read_u64;
