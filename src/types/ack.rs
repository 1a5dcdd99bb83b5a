//! Acknowledgement outcomes for blocking exchanges.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome code carried by every acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckOutcome {
    /// Request accepted.
    Success,
    /// Request malformed or unsupported; `code` is the vehicle's reason code.
    Rejected { code: u32 },
    /// The vehicle reported an internal timeout while handling the request.
    Timeout,
    /// The vehicle is busy; retry after the optional hint.
    Busy { retry_after: Option<Duration> },
}

impl AckOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AckOutcome::Success)
    }
}

/// Typed data a successful acknowledgement may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AckData {
    /// Negotiated link capabilities, returned by the verify exchange.
    Capabilities(LinkCapabilities),
    /// Firmware and hardware identification, returned by the version query.
    Version { firmware: FirmwareVersion, hardware: String },
}

/// Result of one acknowledged exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckResult {
    pub outcome: AckOutcome,
    pub data: Option<AckData>,
}

impl AckResult {
    /// Plain success with no attached data.
    pub fn success() -> Self {
        AckResult { outcome: AckOutcome::Success, data: None }
    }

    /// Success carrying typed data.
    pub fn success_with(data: AckData) -> Self {
        AckResult { outcome: AckOutcome::Success, data: Some(data) }
    }

    /// Rejection with a vehicle reason code.
    pub fn rejected(code: u32) -> Self {
        AckResult { outcome: AckOutcome::Rejected { code }, data: None }
    }

    /// Busy with an optional retry-after hint.
    pub fn busy(retry_after: Option<Duration>) -> Self {
        AckResult { outcome: AckOutcome::Busy { retry_after }, data: None }
    }
}

/// Capabilities negotiated during the one-time verify exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCapabilities {
    /// Telemetry protocol version the link speaks.
    pub protocol_version: u32,
    /// Telemetry bandwidth budget shared by all packages, in bytes per second.
    pub max_bandwidth_bytes_per_sec: u32,
}

/// Flight-controller firmware version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_classification() {
        assert!(AckOutcome::Success.is_success());
        assert!(!AckOutcome::Rejected { code: 1 }.is_success());
        assert!(!AckOutcome::Timeout.is_success());
        assert!(!AckOutcome::Busy { retry_after: None }.is_success());
    }

    #[test]
    fn firmware_version_display() {
        let fw = FirmwareVersion { major: 4, minor: 1, patch: 0, build: 12 };
        assert_eq!(fw.to_string(), "4.1.0.12");
    }
}
