use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::{CallEnvelope, Method};
use crate::error::Result;
use crate::response::{ResponseEnvelope, ResponseKind};

/// Why an inbound message was not recognized as an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoiseReason {
    /// The payload is not a JSON object.
    NotAnObject,
    /// The discriminating field (`method` or `type`) is absent or not a string.
    MissingTag,
    /// The discriminating field names something outside the protocol.
    UnknownTag(String),
    /// Known tag, but the remaining fields do not fit the envelope shape.
    Malformed(String),
}

/// Outcome of decoding a message seen on the shared channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound<T> {
    Envelope(T),
    Noise(NoiseReason),
}

impl<T> Inbound<T> {
    pub fn envelope(self) -> Option<T> {
        match self {
            Inbound::Envelope(envelope) => Some(envelope),
            Inbound::Noise(_) => None,
        }
    }
}

/// Serialize an envelope into the structured payload posted on the channel.
pub fn encode<T: Serialize>(envelope: &T) -> Result<Value> {
    Ok(serde_json::to_value(envelope)?)
}

/// Classify a message as a call envelope or noise.
pub fn decode_call(value: &Value) -> Inbound<CallEnvelope> {
    decode_tagged(value, "method", |tag| tag.parse::<Method>().is_ok())
}

/// Classify a message as a response envelope or noise.
pub fn decode_response(value: &Value) -> Inbound<ResponseEnvelope> {
    decode_tagged(value, "type", |tag| tag.parse::<ResponseKind>().is_ok())
}

fn decode_tagged<'de, T, F>(value: &'de Value, tag_field: &str, known: F) -> Inbound<T>
where
    T: Deserialize<'de>,
    F: Fn(&str) -> bool,
{
    let Some(object) = value.as_object() else {
        return Inbound::Noise(NoiseReason::NotAnObject);
    };
    let tag = match object.get(tag_field).and_then(Value::as_str) {
        Some(tag) => tag,
        None => return Inbound::Noise(NoiseReason::MissingTag),
    };
    if !known(tag) {
        return Inbound::Noise(NoiseReason::UnknownTag(tag.to_string()));
    }
    match T::deserialize(value) {
        Ok(envelope) => Inbound::Envelope(envelope),
        Err(err) => Inbound::Noise(NoiseReason::Malformed(err.to_string())),
    }
}
