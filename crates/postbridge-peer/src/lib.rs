//! The two participants of the postbridge protocol.
//!
//! - [`CallerProxy`] lives in the host document. It turns method calls into
//!   call envelopes, posts them into the embedded frame and resolves one
//!   future per call when the matching response comes back.
//! - [`CalleeDispatcher`] lives in the frame. It executes call envelopes
//!   against an [`EditorCapability`] and posts correlated responses back,
//!   and bridges event subscriptions as `Event` envelopes.
//!
//! Event envelopes all carry the same sentinel correlation id, so the host
//! routes them by event name alone. Two listeners for the same name cannot
//! be told apart; the latest registration wins.

pub mod caller;
pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod embed;
pub mod error;

pub use caller::{CallerProxy, EventHook, Handled};
pub use capability::{
    Argument, CapabilityError, CapabilityResult, EditorCapability, EventCallback,
    ADD_EVENT_LISTENER, DOCUMENT_PATH,
};
pub use config::BridgeConfig;
pub use dispatcher::{CalleeDispatcher, DispatchReport, DispatcherStats};
#[cfg(feature = "schema")]
pub use dispatcher::ValidatorHandle;
pub use document::JsonDocument;
pub use embed::FrameElement;
pub use error::{BridgeError, Result};
