//! Decoded telemetry record shapes.
//!
//! Every topic in the catalog decodes into one of the records here. Wire
//! layouts are fixed little-endian; the byte sizes live in
//! [`Topic::payload_len`](super::topic::Topic::payload_len).

use serde::{Deserialize, Serialize};

/// Attitude quaternion (w, x, y, z).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub q0: f32,
    pub q1: f32,
    pub q2: f32,
    pub q3: f32,
}

/// Three-component vector in the ground (NED) frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Fused global position. Latitude and longitude in degrees, altitude in
/// meters above sea level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
}

/// Smart battery report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    /// Full capacity in mAh.
    pub capacity: u32,
    /// Pack voltage in mV.
    pub voltage: u32,
    /// Current draw in mA, negative while discharging.
    pub current: i32,
    /// Remaining charge, 0-100.
    pub percentage: u8,
}

/// Remote-controller stick and switch positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RcInput {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub throttle: i16,
    pub mode: i16,
    pub gear: i16,
}

/// Gimbal attitude in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GimbalState {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

/// Coarse flight status reported by the flight controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlightStatus {
    #[default]
    Stopped = 0,
    OnGround = 1,
    InAir = 2,
}

impl FlightStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FlightStatus::Stopped),
            1 => Some(FlightStatus::OnGround),
            2 => Some(FlightStatus::InAir),
            _ => None,
        }
    }
}

/// Flight-controller display mode. Mode transitions confirm that the
/// vehicle accepted an action request rather than silently ignoring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DisplayMode {
    ManualCtrl = 0,
    Attitude = 1,
    PGps = 6,
    AutoTakeoff = 15,
    AutoLanding = 16,
    NaviGoHome = 17,
    ForceAutoLanding = 33,
    EngineStart = 41,
}

impl DisplayMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DisplayMode::ManualCtrl),
            1 => Some(DisplayMode::Attitude),
            6 => Some(DisplayMode::PGps),
            15 => Some(DisplayMode::AutoTakeoff),
            16 => Some(DisplayMode::AutoLanding),
            17 => Some(DisplayMode::NaviGoHome),
            33 => Some(DisplayMode::ForceAutoLanding),
            41 => Some(DisplayMode::EngineStart),
            _ => None,
        }
    }
}

/// Requested position offset in the local NED frame plus a yaw target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveOffset {
    /// North offset in meters.
    pub x: f32,
    /// East offset in meters.
    pub y: f32,
    /// Down offset in meters.
    pub z: f32,
    /// Yaw target in degrees.
    pub yaw_deg: f32,
}

// Little-endian field readers used by the topic decoder. Each returns None
// when the slice is shorter than the field.

pub(crate) fn read_f32(bytes: &[u8], offset: usize) -> Option<f32> {
    bytes.get(offset..offset + 4).map(|b| f32::from_le_bytes(b.try_into().unwrap()))
}

pub(crate) fn read_f64(bytes: &[u8], offset: usize) -> Option<f64> {
    bytes.get(offset..offset + 8).map(|b| f64::from_le_bytes(b.try_into().unwrap()))
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes.get(offset..offset + 4).map(|b| u32::from_le_bytes(b.try_into().unwrap()))
}

pub(crate) fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    bytes.get(offset..offset + 4).map(|b| i32::from_le_bytes(b.try_into().unwrap()))
}

pub(crate) fn read_i16(bytes: &[u8], offset: usize) -> Option<i16> {
    bytes.get(offset..offset + 2).map(|b| i16::from_le_bytes(b.try_into().unwrap()))
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    bytes.get(offset..offset + 8).map(|b| u64::from_le_bytes(b.try_into().unwrap()))
}
