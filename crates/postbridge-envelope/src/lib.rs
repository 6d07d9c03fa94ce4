//! Wire envelopes for the postbridge correlation protocol.
//!
//! Exactly two message shapes travel over the channel:
//! - [`CallEnvelope`]: method + correlation id + parameters, host to frame
//! - [`ResponseEnvelope`]: type tag + correlation id + result or event name,
//!   frame to host
//!
//! Everything else seen on the shared channel is noise. The codec reports
//! noise as a value ([`Inbound::Noise`]), never as an error, because every
//! listener on an unaddressed channel sees every other party's traffic.

pub mod call;
pub mod codec;
pub mod correlation;
pub mod error;
pub mod response;
pub mod value;

pub use call::{CallEnvelope, CapabilityCall, DispatchPlan, Method};
pub use codec::{decode_call, decode_response, encode, Inbound, NoiseReason};
pub use correlation::{CorrelationId, EVENT_CORRELATION_ID};
pub use error::{EnvelopeError, Result};
pub use response::{ResponseEnvelope, ResponseKind};
pub use value::{OpaqueRef, PropertyValue, RemoteValue};
