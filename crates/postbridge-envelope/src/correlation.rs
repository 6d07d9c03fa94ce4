use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed correlation id carried by every `AddListener` call and `Event` response.
///
/// Event firings on the frame side have no call-site identity to echo back,
/// so all forwarded events share this id and are routed by event name only.
pub const EVENT_CORRELATION_ID: &str = "event";

/// Opaque token linking a call envelope to its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a fresh random (UUID v4) id.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The shared event sentinel.
    pub fn event() -> Self {
        Self(EVENT_CORRELATION_ID.to_string())
    }

    pub fn is_event_sentinel(&self) -> bool {
        self.0 == EVENT_CORRELATION_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
