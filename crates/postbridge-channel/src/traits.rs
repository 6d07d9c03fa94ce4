use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::origin::TargetOrigin;

/// One inbound message as observed by a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Origin of the window that posted the message.
    pub origin: String,
    /// The structured message payload.
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Callback invoked once per delivered message.
pub type MessageListener = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Something a message can be posted to.
///
/// Posting is fire-and-forget: success means the message was accepted for
/// delivery, never that a listener observed it.
pub trait MessageTarget: Send + Sync {
    /// Post `data` on behalf of a sender at `sender_origin`.
    ///
    /// Targets whose origin does not satisfy `target_origin` drop the
    /// message silently.
    fn post_message(&self, data: Value, sender_origin: &str, target_origin: &TargetOrigin)
        -> Result<()>;
}

impl<T: MessageTarget + ?Sized> MessageTarget for Arc<T> {
    fn post_message(
        &self,
        data: Value,
        sender_origin: &str,
        target_origin: &TargetOrigin,
    ) -> Result<()> {
        (**self).post_message(data, sender_origin, target_origin)
    }
}
