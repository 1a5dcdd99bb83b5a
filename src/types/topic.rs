//! Telemetry topic catalog.
//!
//! Topics are a fixed, versioned enumeration: each carries a stable wire id,
//! a fixed payload size, and a decoded record shape. A subscription package
//! groups up to [`MAX_TOPICS_PER_PACKAGE`] topics sampled at one shared
//! frequency.

use serde::{Deserialize, Serialize};

use super::records::{
    Battery, DisplayMode, FlightStatus, GimbalState, GlobalPosition, Quaternion, RcInput,
    Vector3f, read_f32, read_f64, read_i16, read_i32, read_u32,
};

/// Number of package slots the vehicle exposes; package ids are `0..MAX_PACKAGES`.
pub const MAX_PACKAGES: usize = 5;

/// Maximum number of topics a single package may group.
pub const MAX_TOPICS_PER_PACKAGE: usize = 30;

/// Telemetry topic identifiers.
///
/// The discriminant is the wire id and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Topic {
    Quaternion = 0,
    AccelerationGround = 1,
    VelocityGround = 2,
    AngularRateFused = 3,
    GpsFused = 4,
    AltitudeFused = 5,
    BatteryInfo = 6,
    RcChannels = 7,
    GimbalAngles = 8,
    FlightStatus = 9,
    DisplayMode = 10,
}

/// A decoded topic sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopicValue {
    Quaternion(Quaternion),
    AccelerationGround(Vector3f),
    VelocityGround(Vector3f),
    AngularRateFused(Vector3f),
    GpsFused(GlobalPosition),
    AltitudeFused(f32),
    BatteryInfo(Battery),
    RcChannels(RcInput),
    GimbalAngles(GimbalState),
    FlightStatus(FlightStatus),
    DisplayMode(DisplayMode),
}

impl Topic {
    /// Every topic in catalog order.
    pub const ALL: [Topic; 11] = [
        Topic::Quaternion,
        Topic::AccelerationGround,
        Topic::VelocityGround,
        Topic::AngularRateFused,
        Topic::GpsFused,
        Topic::AltitudeFused,
        Topic::BatteryInfo,
        Topic::RcChannels,
        Topic::GimbalAngles,
        Topic::FlightStatus,
        Topic::DisplayMode,
    ];

    /// Stable wire id of this topic.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a topic by wire id.
    pub fn from_id(id: u8) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.id() == id)
    }

    /// Fixed payload size of one sample of this topic.
    pub fn payload_len(self) -> usize {
        match self {
            Topic::Quaternion => 16,
            Topic::AccelerationGround | Topic::VelocityGround | Topic::AngularRateFused => 12,
            Topic::GpsFused => 20,
            Topic::AltitudeFused => 4,
            Topic::BatteryInfo => 13,
            Topic::RcChannels => 12,
            Topic::GimbalAngles => 12,
            Topic::FlightStatus | Topic::DisplayMode => 1,
        }
    }

    /// Decode one sample of this topic from its fixed little-endian layout.
    ///
    /// Returns `None` when the payload is not exactly [`payload_len`] bytes
    /// or an enum field carries an unknown discriminant.
    ///
    /// [`payload_len`]: Topic::payload_len
    pub fn decode(self, payload: &[u8]) -> Option<TopicValue> {
        if payload.len() != self.payload_len() {
            return None;
        }
        let value = match self {
            Topic::Quaternion => TopicValue::Quaternion(Quaternion {
                q0: read_f32(payload, 0)?,
                q1: read_f32(payload, 4)?,
                q2: read_f32(payload, 8)?,
                q3: read_f32(payload, 12)?,
            }),
            Topic::AccelerationGround => TopicValue::AccelerationGround(decode_vector3(payload)?),
            Topic::VelocityGround => TopicValue::VelocityGround(decode_vector3(payload)?),
            Topic::AngularRateFused => TopicValue::AngularRateFused(decode_vector3(payload)?),
            Topic::GpsFused => TopicValue::GpsFused(GlobalPosition {
                latitude: read_f64(payload, 0)?,
                longitude: read_f64(payload, 8)?,
                altitude: read_f32(payload, 16)?,
            }),
            Topic::AltitudeFused => TopicValue::AltitudeFused(read_f32(payload, 0)?),
            Topic::BatteryInfo => TopicValue::BatteryInfo(Battery {
                capacity: read_u32(payload, 0)?,
                voltage: read_u32(payload, 4)?,
                current: read_i32(payload, 8)?,
                percentage: payload[12],
            }),
            Topic::RcChannels => TopicValue::RcChannels(RcInput {
                roll: read_i16(payload, 0)?,
                pitch: read_i16(payload, 2)?,
                yaw: read_i16(payload, 4)?,
                throttle: read_i16(payload, 6)?,
                mode: read_i16(payload, 8)?,
                gear: read_i16(payload, 10)?,
            }),
            Topic::GimbalAngles => {
                let v = decode_vector3(payload)?;
                TopicValue::GimbalAngles(GimbalState { pitch: v.x, roll: v.y, yaw: v.z })
            }
            Topic::FlightStatus => TopicValue::FlightStatus(FlightStatus::from_u8(payload[0])?),
            Topic::DisplayMode => TopicValue::DisplayMode(DisplayMode::from_u8(payload[0])?),
        };
        Some(value)
    }
}

fn decode_vector3(payload: &[u8]) -> Option<Vector3f> {
    Some(Vector3f {
        x: read_f32(payload, 0)?,
        y: read_f32(payload, 4)?,
        z: read_f32(payload, 8)?,
    })
}

impl TopicValue {
    /// The topic this sample belongs to.
    pub fn topic(&self) -> Topic {
        match self {
            TopicValue::Quaternion(_) => Topic::Quaternion,
            TopicValue::AccelerationGround(_) => Topic::AccelerationGround,
            TopicValue::VelocityGround(_) => Topic::VelocityGround,
            TopicValue::AngularRateFused(_) => Topic::AngularRateFused,
            TopicValue::GpsFused(_) => Topic::GpsFused,
            TopicValue::AltitudeFused(_) => Topic::AltitudeFused,
            TopicValue::BatteryInfo(_) => Topic::BatteryInfo,
            TopicValue::RcChannels(_) => Topic::RcChannels,
            TopicValue::GimbalAngles(_) => Topic::GimbalAngles,
            TopicValue::FlightStatus(_) => Topic::FlightStatus,
            TopicValue::DisplayMode(_) => Topic::DisplayMode,
        }
    }

    /// Append this sample's fixed little-endian layout to `out`.
    ///
    /// Inverse of [`Topic::decode`]; the receiving side of a real link never
    /// encodes, but simulated links and test fixtures do.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TopicValue::Quaternion(q) => {
                out.extend_from_slice(&q.q0.to_le_bytes());
                out.extend_from_slice(&q.q1.to_le_bytes());
                out.extend_from_slice(&q.q2.to_le_bytes());
                out.extend_from_slice(&q.q3.to_le_bytes());
            }
            TopicValue::AccelerationGround(v)
            | TopicValue::VelocityGround(v)
            | TopicValue::AngularRateFused(v) => encode_vector3(v, out),
            TopicValue::GpsFused(p) => {
                out.extend_from_slice(&p.latitude.to_le_bytes());
                out.extend_from_slice(&p.longitude.to_le_bytes());
                out.extend_from_slice(&p.altitude.to_le_bytes());
            }
            TopicValue::AltitudeFused(alt) => out.extend_from_slice(&alt.to_le_bytes()),
            TopicValue::BatteryInfo(b) => {
                out.extend_from_slice(&b.capacity.to_le_bytes());
                out.extend_from_slice(&b.voltage.to_le_bytes());
                out.extend_from_slice(&b.current.to_le_bytes());
                out.push(b.percentage);
            }
            TopicValue::RcChannels(rc) => {
                out.extend_from_slice(&rc.roll.to_le_bytes());
                out.extend_from_slice(&rc.pitch.to_le_bytes());
                out.extend_from_slice(&rc.yaw.to_le_bytes());
                out.extend_from_slice(&rc.throttle.to_le_bytes());
                out.extend_from_slice(&rc.mode.to_le_bytes());
                out.extend_from_slice(&rc.gear.to_le_bytes());
            }
            TopicValue::GimbalAngles(g) => {
                encode_vector3(&Vector3f { x: g.pitch, y: g.roll, z: g.yaw }, out)
            }
            TopicValue::FlightStatus(s) => out.push(*s as u8),
            TopicValue::DisplayMode(m) => out.push(*m as u8),
        }
    }
}

fn encode_vector3(v: &Vector3f, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.x.to_le_bytes());
    out.extend_from_slice(&v.y.to_le_bytes());
    out.extend_from_slice(&v.z.to_le_bytes());
}
