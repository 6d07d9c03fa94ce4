use std::fmt;
use std::str::FromStr;

use crate::error::{ChannelError, Result};

/// Wildcard target accepted by every window.
pub const WILDCARD: &str = "*";

/// Outbound origin restriction for a posted message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetOrigin {
    /// `"*"`: deliver regardless of the receiving window's origin.
    #[default]
    Any,
    /// Deliver only if the receiving window has exactly this origin.
    Exact(String),
}

impl TargetOrigin {
    /// Returns true if a window at `origin` may receive the message.
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin,
        }
    }
}

impl FromStr for TargetOrigin {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" => Err(ChannelError::InvalidOrigin(s.to_string())),
            WILDCARD => Ok(TargetOrigin::Any),
            other => Ok(TargetOrigin::Exact(other.to_string())),
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOrigin::Any => f.write_str(WILDCARD),
            TargetOrigin::Exact(origin) => f.write_str(origin),
        }
    }
}

/// Inbound origin acceptance rule.
///
/// `Wildcard` accepts every sender without authentication. Prefer an
/// allow-list for anything reachable by third-party documents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    #[default]
    Wildcard,
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Build an allow-list policy from any iterable of origins.
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OriginPolicy::AllowList(origins.into_iter().map(Into::into).collect())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, OriginPolicy::Wildcard)
    }

    /// Accept or reject a message from `origin`.
    pub fn check(&self, origin: &str) -> Result<()> {
        match self {
            OriginPolicy::Wildcard => Ok(()),
            OriginPolicy::AllowList(allowed) if allowed.iter().any(|o| o == origin) => Ok(()),
            OriginPolicy::AllowList(_) => Err(ChannelError::UntrustedOrigin {
                origin: origin.to_string(),
            }),
        }
    }
}
