/// Errors that can occur during envelope validation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// A schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The envelope failed validation.
    #[error("{shape} validation failed: {message}")]
    ValidationFailed { shape: &'static str, message: String },

    /// A schema or payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
