//! Activation snapshot.

use serde::{Deserialize, Serialize};

use super::ack::FirmwareVersion;

/// Immutable record of the activation exchange performed at startup.
///
/// Produced once by [`LinkSetup`](crate::LinkSetup) and handed to dependent
/// components by value; there is no mutable process-wide activation state to
/// query after initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationInfo {
    /// Registered application id the link was activated with.
    pub app_id: u32,
    /// Flight-controller firmware version reported during setup.
    pub firmware: FirmwareVersion,
    /// Hardware identification string reported during setup.
    pub hardware: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_plain_data() {
        let info = ActivationInfo {
            app_id: 1_024_991,
            firmware: FirmwareVersion { major: 4, minor: 0, patch: 0, build: 1 },
            hardware: "M300".to_string(),
        };
        let copy = info.clone();
        assert_eq!(info, copy);
    }
}
