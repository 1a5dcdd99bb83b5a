//! Error types for gateway operations.
//!
//! All blocking operations surface their outcome as an explicit result value:
//! a timed-out call returns [`GatewayError::LinkTimeout`] within its stated
//! deadline, a refused command returns [`GatewayError::CommandRejected`], and
//! so on. Nothing is silently swallowed and nothing terminates the process.
//!
//! A timed-out request may still be in flight on the link; callers must treat
//! the outcome as unknown and re-verify vehicle state before retrying.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("link did not respond within {elapsed:?}")]
    LinkTimeout { elapsed: Duration },

    #[error("subscription request rejected: {reason}")]
    SubscriptionRejected { reason: String },

    #[error("package {id} is already defined")]
    DuplicatePackage { id: u8 },

    #[error("package {id} is not defined")]
    UnknownPackage { id: u8 },

    #[error("telemetry link has not been verified")]
    LinkNotVerified,

    #[error("invalid package definition: {reason}")]
    InvalidPackage { reason: String },

    #[error("vehicle rejected the command: {reason}")]
    CommandRejected { reason: String },

    #[error("landing not confirmed within {elapsed:?}")]
    LandingTimeout { elapsed: Duration },

    #[error("link busy{}", retry_hint(.retry_after))]
    LinkBusy { retry_after: Option<Duration> },

    #[error("no {channel} frame has been received yet")]
    BufferEmpty { channel: &'static str },

    #[error("companion payload of {len} bytes exceeds the {max}-byte limit")]
    OversizedPayload { len: usize, max: usize },

    #[error("link closed")]
    LinkClosed,

    #[error("invalid gateway configuration: {reason}")]
    Config { reason: String },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {d:?}"),
        None => String::new(),
    }
}

impl GatewayError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Retry policy itself belongs to the caller; the gateway never retries a
    /// request internally.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::LinkTimeout { .. } => true,
            GatewayError::LinkBusy { .. } => true,
            GatewayError::LandingTimeout { .. } => true,
            GatewayError::BufferEmpty { .. } => true,
            GatewayError::SubscriptionRejected { .. } => false,
            GatewayError::DuplicatePackage { .. } => false,
            GatewayError::UnknownPackage { .. } => false,
            GatewayError::LinkNotVerified => false,
            GatewayError::InvalidPackage { .. } => false,
            GatewayError::CommandRejected { .. } => false,
            GatewayError::OversizedPayload { .. } => false,
            GatewayError::LinkClosed => false,
            GatewayError::Config { .. } => false,
        }
    }

    /// Returns the vehicle's retry-after hint, if one was provided.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::LinkBusy { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Helper constructor for link timeouts.
    pub fn link_timeout(elapsed: Duration) -> Self {
        GatewayError::LinkTimeout { elapsed }
    }

    /// Helper constructor for rejected subscription requests.
    pub fn subscription_rejected(reason: impl Into<String>) -> Self {
        GatewayError::SubscriptionRejected { reason: reason.into() }
    }

    /// Helper constructor for invalid package definitions.
    pub fn invalid_package(reason: impl Into<String>) -> Self {
        GatewayError::InvalidPackage { reason: reason.into() }
    }

    /// Helper constructor for refused commands.
    pub fn command_rejected(reason: impl Into<String>) -> Self {
        GatewayError::CommandRejected { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        GatewayError::Config { reason: reason.into() }
    }
}
