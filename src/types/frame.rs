//! Frame types flowing from the receiver task to consumers.

use serde::{Deserialize, Serialize};

use super::records::{
    Battery, DisplayMode, FlightStatus, GimbalState, GlobalPosition, Quaternion, RcInput, Vector3f,
};
use super::topic::TopicValue;

/// One decoded telemetry frame of a subscription package.
///
/// Samples appear in the package's topic order; `timestamp_us` is present
/// when the package was defined with the send-timestamp flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageFrame {
    pub package_id: u8,
    /// Vehicle clock at sampling time, microseconds since boot.
    pub timestamp_us: Option<u64>,
    pub values: Vec<TopicValue>,
}

/// One decoded broadcast frame.
///
/// Broadcast data arrives outside the package system at the vehicle's
/// default rates and feeds the [`VehicleSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastFrame {
    pub values: Vec<TopicValue>,
}

/// Latest-known vehicle state assembled from broadcast frames.
///
/// Every field is `None` until the first broadcast carrying it arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub quaternion: Option<Quaternion>,
    pub acceleration: Option<Vector3f>,
    pub velocity: Option<Vector3f>,
    pub angular_rate: Option<Vector3f>,
    pub position: Option<GlobalPosition>,
    pub altitude: Option<f32>,
    pub battery: Option<Battery>,
    pub rc: Option<RcInput>,
    pub gimbal: Option<GimbalState>,
    pub flight_status: Option<FlightStatus>,
    pub display_mode: Option<DisplayMode>,
}

impl VehicleSnapshot {
    /// Fold a broadcast frame into the snapshot, newest value wins per topic.
    pub fn apply(&mut self, frame: &BroadcastFrame) {
        for value in &frame.values {
            match value {
                TopicValue::Quaternion(q) => self.quaternion = Some(*q),
                TopicValue::AccelerationGround(v) => self.acceleration = Some(*v),
                TopicValue::VelocityGround(v) => self.velocity = Some(*v),
                TopicValue::AngularRateFused(v) => self.angular_rate = Some(*v),
                TopicValue::GpsFused(p) => self.position = Some(*p),
                TopicValue::AltitudeFused(alt) => self.altitude = Some(*alt),
                TopicValue::BatteryInfo(b) => self.battery = Some(*b),
                TopicValue::RcChannels(rc) => self.rc = Some(*rc),
                TopicValue::GimbalAngles(g) => self.gimbal = Some(*g),
                TopicValue::FlightStatus(s) => self.flight_status = Some(*s),
                TopicValue::DisplayMode(m) => self.display_mode = Some(*m),
            }
        }
    }
}
