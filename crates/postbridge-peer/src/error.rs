use std::time::Duration;

use postbridge_channel::ChannelError;

/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The embedding surface cannot host a bridge.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No response arrived within the configured call timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Inbound message from an origin outside the allow-list.
    #[error("untrusted origin: {origin}")]
    UntrustedOrigin { origin: String },

    /// Channel-level error.
    #[error("channel error: {0}")]
    Channel(ChannelError),

    /// Envelope encoding error.
    #[error("envelope error: {0}")]
    Envelope(#[from] postbridge_envelope::EnvelopeError),

    /// The pending call was abandoned before a response arrived.
    #[error("bridge disconnected: {0}")]
    Disconnected(String),

    /// Envelope schema validation error.
    #[cfg(feature = "schema")]
    #[error("schema validation error: {0}")]
    Schema(#[from] postbridge_schema::SchemaError),
}

impl From<ChannelError> for BridgeError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::UntrustedOrigin { origin } => BridgeError::UntrustedOrigin { origin },
            other => BridgeError::Channel(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
