use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationId;
use crate::error::EnvelopeError;
use crate::response::ResponseKind;
use crate::value::PropertyValue;

/// Operation requested by a call envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    GetObject,
    SetProperty,
    ExecuteFunction,
    AddListener,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::GetObject,
        Method::SetProperty,
        Method::ExecuteFunction,
        Method::AddListener,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::GetObject => "GetObject",
            Method::SetProperty => "SetProperty",
            Method::ExecuteFunction => "ExecuteFunction",
            Method::AddListener => "AddListener",
        }
    }
}

impl FromStr for Method {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownTag {
                kind: "method",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-to-frame request.
///
/// Which optional fields are required depends on `method`; see
/// [`CallEnvelope::plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    pub method: Method,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl CallEnvelope {
    fn bare(method: Method, correlation_id: CorrelationId) -> Self {
        Self {
            method,
            correlation_id,
            path: None,
            property: None,
            value: None,
            function: None,
            parameters: None,
            event_name: None,
        }
    }

    pub fn get_object(correlation_id: CorrelationId, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::bare(Method::GetObject, correlation_id)
        }
    }

    pub fn set_property(
        correlation_id: CorrelationId,
        path: impl Into<String>,
        property: impl Into<String>,
        value: PropertyValue,
    ) -> Self {
        Self {
            path: Some(path.into()),
            property: Some(property.into()),
            value: Some(value),
            ..Self::bare(Method::SetProperty, correlation_id)
        }
    }

    pub fn execute_function(
        correlation_id: CorrelationId,
        path: impl Into<String>,
        function: impl Into<String>,
        parameters: Vec<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            function: Some(function.into()),
            parameters: Some(parameters),
            ..Self::bare(Method::ExecuteFunction, correlation_id)
        }
    }

    /// Subscription request. Always carries the event sentinel id.
    pub fn add_listener(event_name: impl Into<String>) -> Self {
        Self {
            event_name: Some(event_name.into()),
            ..Self::bare(Method::AddListener, CorrelationId::event())
        }
    }

    /// Work the frame side should do for this envelope.
    ///
    /// The capability call and the subscription are evaluated independently.
    /// An envelope missing a required field plans no work for that step.
    pub fn plan(&self) -> DispatchPlan<'_> {
        let call = self.path.as_deref().and_then(|path| match self.method {
            Method::GetObject => Some(CapabilityCall::GetObject { path }),
            Method::SetProperty => match (self.property.as_deref(), self.value.as_ref()) {
                (Some(property), Some(value)) => Some(CapabilityCall::SetProperty {
                    path,
                    property,
                    value,
                }),
                _ => None,
            },
            Method::ExecuteFunction => {
                self.function
                    .as_deref()
                    .map(|function| CapabilityCall::ExecuteFunction {
                        path,
                        function,
                        parameters: self.parameters.as_deref().unwrap_or(&[]),
                    })
            }
            Method::AddListener => None,
        });

        let subscribe = match self.method {
            Method::AddListener => self.event_name.as_deref(),
            _ => None,
        };

        DispatchPlan { call, subscribe }
    }
}

/// A capability invocation derived from a call envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapabilityCall<'a> {
    GetObject {
        path: &'a str,
    },
    SetProperty {
        path: &'a str,
        property: &'a str,
        value: &'a PropertyValue,
    },
    ExecuteFunction {
        path: &'a str,
        function: &'a str,
        parameters: &'a [String],
    },
}

impl CapabilityCall<'_> {
    /// Response type answering this call.
    pub fn response_kind(&self) -> ResponseKind {
        match self {
            CapabilityCall::GetObject { .. } => ResponseKind::ReturnObject,
            CapabilityCall::SetProperty { .. } => ResponseKind::ReturnProperty,
            CapabilityCall::ExecuteFunction { .. } => ResponseKind::ReturnFunction,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            CapabilityCall::GetObject { path }
            | CapabilityCall::SetProperty { path, .. }
            | CapabilityCall::ExecuteFunction { path, .. } => path,
        }
    }
}

/// Result of [`CallEnvelope::plan`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPlan<'a> {
    pub call: Option<CapabilityCall<'a>>,
    /// Event name to bridge, for `AddListener` envelopes.
    pub subscribe: Option<&'a str>,
}

impl DispatchPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.call.is_none() && self.subscribe.is_none()
    }
}
