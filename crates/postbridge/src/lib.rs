//! Correlated request/response bridge over a cross-document message channel.
//!
//! A host document drives an embedded frame through four operations (read
//! an object, set a property, call a function, subscribe to an event). Each
//! call carries a fresh correlation id, and the frame answers under the
//! same id. Event firings come back under a shared sentinel id and are
//! routed by event name.
//!
//! # Crate Structure
//!
//! - [`channel`]: windows, origins and the message target abstraction
//! - [`envelope`]: the call and response wire shapes and their codec
//! - [`schema`]: optional JSON Schema validation of envelopes (behind `schema` feature)
//! - [`peer`]: the caller proxy and callee dispatcher (behind `peer` feature)

/// Re-export channel types.
pub mod channel {
    pub use postbridge_channel::*;
}

/// Re-export envelope types.
pub mod envelope {
    pub use postbridge_envelope::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use postbridge_schema::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use postbridge_peer::*;
}
