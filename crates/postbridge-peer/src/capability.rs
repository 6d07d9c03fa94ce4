use std::fmt;
use std::sync::Arc;

use postbridge_envelope::{PropertyValue, RemoteValue};

/// Path addressing the document itself.
pub const DOCUMENT_PATH: &str = "document";
/// Function name used to subscribe to document events through
/// [`EditorCapability::execute_function`].
pub const ADD_EVENT_LISTENER: &str = "AddEventListener";

/// Callback fired when a subscribed event occurs. The event payload is
/// opaque and is not passed along.
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;

/// Argument to a remote function.
///
/// Envelopes only ever carry text. Callbacks are produced locally by the
/// dispatcher when it bridges a subscription.
#[derive(Clone)]
pub enum Argument {
    Text(String),
    Callback(EventCallback),
}

impl Argument {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(text) => Some(text),
            Argument::Callback(_) => None,
        }
    }

    pub fn as_callback(&self) -> Option<&EventCallback> {
        match self {
            Argument::Callback(callback) => Some(callback),
            Argument::Text(_) => None,
        }
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Argument::Callback(_) => f.write_str("Callback(<fn>)"),
        }
    }
}

/// Failure reported by a capability implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("no object at path {0:?}")]
    NotFound(String),

    #[error("unknown function {function:?} on {path:?}")]
    UnknownFunction { path: String, function: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Failed(String),
}

pub type CapabilityResult = std::result::Result<RemoteValue, CapabilityError>;

/// Object graph the frame side exposes to the host.
///
/// Implementations run on the dispatcher's message turn and should return
/// promptly. Work that completes later can be reported as a
/// [`RemoteValue::Opaque`] handle.
///
/// Subscriptions use the same surface:
/// `execute_function(DOCUMENT_PATH, ADD_EVENT_LISTENER, [Text(name), Callback(cb)])`.
/// Whether subscribing twice to one name registers the callback twice is
/// up to the implementation.
pub trait EditorCapability: Send + Sync {
    fn get_object(&self, path: &str) -> CapabilityResult;

    fn set_property(&self, path: &str, property: &str, value: &PropertyValue) -> CapabilityResult;

    fn execute_function(&self, path: &str, function: &str, args: Vec<Argument>)
        -> CapabilityResult;
}
