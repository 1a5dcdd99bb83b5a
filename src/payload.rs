//! Camera and gimbal parameter pass-throughs.
//!
//! These are thin, acked setters with no state machine of their own: values
//! are forwarded to the link untranslated. Parameter encoding is the link
//! layer's concern.

use serde::{Deserialize, Serialize};

/// Which payload bay the operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadIndex {
    Payload0,
    Payload1,
    Payload2,
}

/// Sensor sensitivity, as the raw ISO number (100, 200, ... 25600).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iso(pub u16);

/// Aperture as the f-number times 100 (f/2.8 is `Aperture(280)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aperture(pub u16);

/// Shutter speed as a fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutterSpeed {
    pub numerator: u32,
    pub denominator: u32,
}

/// Exposure program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureMode {
    Program,
    ShutterPriority,
    AperturePriority,
    Manual,
}

/// Exposure compensation in 1/3 EV steps, negative is darker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureCompensation(pub i8);

/// Optical zoom direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Camera operations forwarded through the link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CameraOp {
    SetIso(Iso),
    SetAperture(Aperture),
    SetShutterSpeed(ShutterSpeed),
    SetExposureMode(ExposureMode),
    SetExposureCompensation(ExposureCompensation),
    /// Focus target in normalized image coordinates, (0,0) top-left.
    SetFocusPoint { x: f32, y: f32 },
    StartZoom { direction: ZoomDirection, speed: u8 },
    StopZoom,
    ShootSinglePhoto,
    StopShootPhoto,
    StartRecordVideo,
    StopRecordVideo,
}

/// Gimbal rotation request, angles relative to the current attitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GimbalRotation {
    pub roll_deg: f32,
    pub pitch_deg: f32,
    pub yaw_deg: f32,
    /// Time to complete the rotation.
    pub duration_s: f32,
}

/// Gimbal operations forwarded through the link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GimbalOp {
    Rotate(GimbalRotation),
    Reset,
}
