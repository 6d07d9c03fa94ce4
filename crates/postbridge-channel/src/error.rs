/// Errors that can occur on the message channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The window has been closed and no longer accepts messages.
    #[error("window closed")]
    Closed,

    /// A message arrived from an origin outside the configured allow-list.
    #[error("untrusted origin: {origin}")]
    UntrustedOrigin { origin: String },

    /// An origin string could not be used as a window origin or target.
    #[error("invalid origin: {0:?}")]
    InvalidOrigin(String),

    /// A window event loop was requested outside a Tokio runtime.
    #[error("no Tokio runtime available to drive the window event loop")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
