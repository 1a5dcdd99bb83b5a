//! Link initialization.

use std::time::Duration;

use tracing::info;

use crate::GatewayConfig;
use crate::link::{LinkRequest, RequestBroker};
use crate::types::{AckData, AckOutcome, ActivationInfo};
use crate::{GatewayError, Result};

/// Configured setup collaborator owned by the facade.
///
/// Performs the activation and version exchanges once at startup and produces
/// the immutable [`ActivationInfo`] snapshot. Holding this as an explicit
/// component keeps initialization state out of the facade itself.
#[derive(Debug)]
pub struct LinkSetup {
    config: GatewayConfig,
}

impl LinkSetup {
    pub fn new(config: GatewayConfig) -> Self {
        LinkSetup { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Activate the link and query firmware identification.
    pub async fn initialize(
        &self,
        broker: &RequestBroker,
        timeout: Duration,
    ) -> Result<ActivationInfo> {
        self.config.validate()?;

        let activate = LinkRequest::Activate {
            app_id: self.config.app_id,
            app_key: self.config.app_key.clone(),
        };
        let ack = broker.request(activate, timeout).await?;
        match ack.outcome {
            AckOutcome::Success => {}
            AckOutcome::Rejected { code } => {
                return Err(GatewayError::config(format!(
                    "activation rejected (code {code:#x}); check app_id/app_key"
                )));
            }
            AckOutcome::Timeout => return Err(GatewayError::link_timeout(timeout)),
            AckOutcome::Busy { retry_after } => {
                return Err(GatewayError::LinkBusy { retry_after });
            }
        }

        let version = broker.request(LinkRequest::QueryVersion, timeout).await?;
        let (firmware, hardware) = match version.data {
            Some(AckData::Version { firmware, hardware }) => (firmware, hardware),
            _ => {
                return Err(GatewayError::config(
                    "version query returned no identification data",
                ));
            }
        };

        info!(app_id = self.config.app_id, %firmware, %hardware, "link activated");
        Ok(ActivationInfo { app_id: self.config.app_id, firmware, hardware })
    }
}
