//! Local rate control for telemetry streams.

use serde::{Deserialize, Serialize};

/// Consumer-side delivery rate for a package stream.
///
/// This limits local delivery only; the package frequency negotiated with
/// the vehicle is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StreamRate {
    /// Every frame the package produces.
    Native,

    /// At most `hz` frames per second, latest frame wins.
    /// Requests at or above the package frequency fall back to `Native`.
    Max(u32),
}

impl StreamRate {
    /// Normalize against the package's negotiated frequency.
    pub fn normalize(self, package_hz: f64) -> Self {
        match self {
            StreamRate::Native => StreamRate::Native,
            StreamRate::Max(hz) if hz as f64 >= package_hz => StreamRate::Native,
            StreamRate::Max(hz) => StreamRate::Max(hz),
        }
    }

    /// Throttle interval to apply locally, if any.
    pub fn throttle_interval(self, package_hz: f64) -> Option<std::time::Duration> {
        match self.normalize(package_hz) {
            StreamRate::Native => None,
            StreamRate::Max(hz) => Some(std::time::Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
