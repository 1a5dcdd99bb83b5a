//! Stream utilities for telemetry consumers.

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
