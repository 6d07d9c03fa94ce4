use std::time::Duration;

use postbridge_channel::{OriginPolicy, TargetOrigin};

/// Behavior shared by both participants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeConfig {
    /// Upper bound on how long a call waits for its response.
    /// `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Origin restriction applied to every outbound envelope.
    pub target_origin: TargetOrigin,
    /// Origins inbound envelopes are accepted from.
    pub accepted_origins: OriginPolicy,
}

impl BridgeConfig {
    /// Send only to `peer_origin` and accept only from it.
    pub fn restricted(peer_origin: impl Into<String>) -> Self {
        let peer_origin = peer_origin.into();
        Self {
            call_timeout: None,
            target_origin: TargetOrigin::Exact(peer_origin.clone()),
            accepted_origins: OriginPolicy::AllowList(vec![peer_origin]),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// True if both directions are unrestricted.
    pub fn is_wildcard(&self) -> bool {
        self.target_origin == TargetOrigin::Any && self.accepted_origins.is_wildcard()
    }
}
