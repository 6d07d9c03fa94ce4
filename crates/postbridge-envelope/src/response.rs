use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationId;
use crate::error::EnvelopeError;
use crate::value::RemoteValue;

/// Type tag of a frame-to-host message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    ReturnProperty,
    ReturnFunction,
    ReturnObject,
    Event,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 4] = [
        ResponseKind::ReturnProperty,
        ResponseKind::ReturnFunction,
        ResponseKind::ReturnObject,
        ResponseKind::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::ReturnProperty => "ReturnProperty",
            ResponseKind::ReturnFunction => "ReturnFunction",
            ResponseKind::ReturnObject => "ReturnObject",
            ResponseKind::Event => "Event",
        }
    }

    /// True for the three kinds that resolve a pending call.
    pub fn is_return(self) -> bool {
        !matches!(self, ResponseKind::Event)
    }
}

impl FromStr for ResponseKind {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResponseKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownTag {
                kind: "response type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame-to-host message: a call result or a forwarded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RemoteValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Set when the capability failed to produce a result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Result of a capability call. A `Null` result is sent as absent.
    pub fn returned(
        kind: ResponseKind,
        correlation_id: CorrelationId,
        result: RemoteValue,
    ) -> Self {
        Self {
            kind,
            correlation_id,
            result: (!result.is_null()).then_some(result),
            event_name: None,
            error: None,
        }
    }

    /// Answer for a call whose capability invocation failed.
    pub fn failed(
        kind: ResponseKind,
        correlation_id: CorrelationId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            correlation_id,
            result: None,
            event_name: None,
            error: Some(message.into()),
        }
    }

    /// A forwarded event firing.
    pub fn event(event_name: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Event,
            correlation_id: CorrelationId::event(),
            result: None,
            event_name: Some(event_name.into()),
            error: None,
        }
    }

    /// The result, with absent mapped to `Null`.
    pub fn result_value(&self) -> RemoteValue {
        self.result.clone().unwrap_or(RemoteValue::Null)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
