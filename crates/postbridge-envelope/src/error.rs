/// Errors that can occur while encoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A method or response type string is not part of the protocol.
    #[error("unknown {kind} {value:?}")]
    UnknownTag { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
