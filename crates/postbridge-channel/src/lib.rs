//! Cross-document message channel primitive.
//!
//! Models the platform messaging surface the bridge runs on:
//! - [`Window`]: an in-memory browsing context with an origin, a listener
//!   list and an event loop that delivers one message per turn
//! - [`MessageTarget`]: anything a message can be posted to
//! - [`TargetOrigin`] / [`OriginPolicy`]: outbound and inbound origin rules
//!
//! This is the lowest layer of postbridge. Every participant has at least
//! one [`Window`] it listens on and one [`MessageTarget`] it posts to.

pub mod error;
pub mod origin;
pub mod traits;
pub mod window;

pub use error::{ChannelError, Result};
pub use origin::{OriginPolicy, TargetOrigin};
pub use traits::{MessageEvent, MessageListener, MessageTarget};
pub use window::{ListenerId, Window};
