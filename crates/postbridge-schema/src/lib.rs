//! Optional JSON Schema validation of postbridge envelopes.
//!
//! Validates call and response envelopes against JSON Schema 2020-12
//! before they reach a dispatcher. Per-method schemas can tighten the
//! contract further (for example, which paths a frame accepts).
//!
//! This crate is optional. Use it when the channel is shared with parties
//! you do not control.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::ValidatorConfig;
pub use error::{Result, SchemaError};
pub use registry::{EnvelopeValidator, Shape};
