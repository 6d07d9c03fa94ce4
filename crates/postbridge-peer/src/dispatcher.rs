use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use postbridge_channel::{ListenerId, MessageEvent, MessageTarget, Window};
use postbridge_envelope::{
    decode_call, encode, CapabilityCall, CorrelationId, Inbound, Method, NoiseReason,
    ResponseEnvelope,
};
use tracing::{debug, info, warn};

use crate::capability::{
    Argument, EditorCapability, EventCallback, ADD_EVENT_LISTENER, DOCUMENT_PATH,
};
use crate::config::BridgeConfig;
use crate::error::Result;

#[cfg(feature = "schema")]
use std::sync::Mutex;

/// Shared validator handle attached to a dispatcher.
#[cfg(feature = "schema")]
pub type ValidatorHandle = Arc<postbridge_schema::EnvelopeValidator>;

/// What the dispatcher did with one inbound message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchReport {
    /// Method of the decoded call envelope.
    pub method: Option<Method>,
    /// Response posted back to the parent for a capability call.
    pub response: Option<ResponseEnvelope>,
    /// Event name bridged through `AddEventListener`.
    pub subscribed: Option<String>,
    /// Why the message was not treated as a call envelope.
    pub noise: Option<NoiseReason>,
}

impl DispatchReport {
    fn noise(reason: NoiseReason) -> Self {
        Self {
            noise: Some(reason),
            ..Self::default()
        }
    }

    /// True if a response was posted or a subscription was bridged.
    pub fn dispatched(&self) -> bool {
        self.response.is_some() || self.subscribed.is_some()
    }
}

/// Running counters for one dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatcherStats {
    /// Call envelopes decoded.
    pub received: u64,
    /// Responses posted to the parent.
    pub responses: u64,
    /// Capability calls or subscriptions that failed.
    pub failures: u64,
    /// Subscriptions bridged.
    pub subscriptions: u64,
    /// Events forwarded to the parent.
    pub events_forwarded: u64,
    /// Well-formed envelopes that planned no work (missing required fields).
    pub skipped: u64,
    /// Messages that were not call envelopes.
    pub noise: u64,
    /// Messages refused by the origin policy or schema validation.
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    responses: AtomicU64,
    failures: AtomicU64,
    subscriptions: AtomicU64,
    events_forwarded: AtomicU64,
    skipped: AtomicU64,
    noise: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            received: self.received.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            noise: self.noise.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Frame-side end of the bridge.
///
/// Executes call envelopes against an [`EditorCapability`] and posts each
/// result to the parent under the caller's correlation id. `AddListener`
/// envelopes are bridged through the capability's `AddEventListener`
/// function with a callback that forwards every firing as an `Event`
/// envelope carrying the sentinel correlation id.
///
/// Forwarding callbacks hold the dispatcher weakly. Once it is dropped,
/// subscriptions still registered with the capability go quiet.
pub struct CalleeDispatcher {
    inner: Arc<DispatcherInner>,
    attachments: Vec<(Window, ListenerId)>,
}

struct DispatcherInner {
    capability: Arc<dyn EditorCapability>,
    parent: Arc<dyn MessageTarget>,
    origin: String,
    config: BridgeConfig,
    counters: Counters,
    #[cfg(feature = "schema")]
    validator: Mutex<Option<ValidatorHandle>>,
}

impl CalleeDispatcher {
    /// Create a detached dispatcher.
    ///
    /// `origin` is the frame's own origin, reported as the sender of every
    /// response. Nothing is received until [`attach`](Self::attach) is called
    /// or messages are fed to [`handle_message`](Self::handle_message).
    pub fn new(
        capability: Arc<dyn EditorCapability>,
        parent: Arc<dyn MessageTarget>,
        origin: impl Into<String>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                capability,
                parent,
                origin: origin.into(),
                config,
                counters: Counters::default(),
                #[cfg(feature = "schema")]
                validator: Mutex::new(None),
            }),
            attachments: Vec::new(),
        }
    }

    /// Create a dispatcher listening on `window` and answering to `parent`.
    pub fn install(
        window: &Window,
        parent: Arc<dyn MessageTarget>,
        capability: Arc<dyn EditorCapability>,
        config: BridgeConfig,
    ) -> Self {
        let mut dispatcher = Self::new(capability, parent, window.origin(), config);
        dispatcher.attach(window);
        dispatcher
    }

    /// Validate inbound call envelopes before dispatching them.
    #[cfg(feature = "schema")]
    pub fn with_validator(self, validator: ValidatorHandle) -> Self {
        *self
            .inner
            .validator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(validator);
        self
    }

    /// Start handling messages delivered to `window`.
    pub fn attach(&mut self, window: &Window) {
        let weak: Weak<DispatcherInner> = Arc::downgrade(&self.inner);
        let id = window.add_message_listener(move |event| {
            let Some(inner) = weak.upgrade() else { return };
            if let Err(err) = inner.handle_message(event) {
                warn!(error = %err, origin = %event.origin, "inbound message rejected");
            }
        });
        debug!(window = %window.origin(), "callee dispatcher attached");
        self.attachments.push((window.clone(), id));
    }

    /// Handle one inbound message. Normally driven by attached windows.
    pub fn handle_message(&self, event: &MessageEvent) -> Result<DispatchReport> {
        self.inner.handle_message(event)
    }

    pub fn stats(&self) -> DispatcherStats {
        self.inner.counters.snapshot()
    }

    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }
}

impl Drop for CalleeDispatcher {
    fn drop(&mut self) {
        for (window, id) in self.attachments.drain(..) {
            window.remove_message_listener(id);
        }
    }
}

impl fmt::Debug for CalleeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalleeDispatcher")
            .field("origin", &self.inner.origin)
            .field("config", &self.inner.config)
            .field("attachments", &self.attachments.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl DispatcherInner {
    fn handle_message(self: &Arc<Self>, event: &MessageEvent) -> Result<DispatchReport> {
        if let Err(err) = self.config.accepted_origins.check(&event.origin) {
            Counters::bump(&self.counters.rejected);
            return Err(err.into());
        }

        #[cfg(feature = "schema")]
        self.validate(&event.data)?;

        let call = match decode_call(&event.data) {
            Inbound::Envelope(call) => call,
            Inbound::Noise(reason) => {
                Counters::bump(&self.counters.noise);
                debug!(?reason, origin = %event.origin, "ignoring non-call message");
                return Ok(DispatchReport::noise(reason));
            }
        };
        Counters::bump(&self.counters.received);

        let plan = call.plan();
        let mut report = DispatchReport {
            method: Some(call.method),
            ..DispatchReport::default()
        };

        if let Some(capability_call) = plan.call {
            let response = self.invoke(&call.correlation_id, capability_call);
            self.post(&response)?;
            Counters::bump(&self.counters.responses);
            report.response = Some(response);
        }

        if let Some(event_name) = plan.subscribe {
            if self.subscribe(event_name) {
                report.subscribed = Some(event_name.to_string());
            }
        }

        if plan.is_empty() {
            Counters::bump(&self.counters.skipped);
            debug!(
                method = %call.method,
                id = %call.correlation_id,
                "call envelope lacks required fields, nothing dispatched"
            );
        }
        Ok(report)
    }

    #[cfg(feature = "schema")]
    fn validate(&self, data: &serde_json::Value) -> Result<()> {
        let validator = self
            .validator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let Some(validator) = validator else {
            return Ok(());
        };
        // Only messages claiming to be calls are held to the call schema.
        if data.get("method").is_none() {
            return Ok(());
        }
        if let Err(err) = validator.validate_call(data) {
            Counters::bump(&self.counters.rejected);
            return Err(err.into());
        }
        Ok(())
    }

    fn invoke(&self, id: &CorrelationId, call: CapabilityCall<'_>) -> ResponseEnvelope {
        let kind = call.response_kind();
        let outcome = match call {
            CapabilityCall::GetObject { path } => self.capability.get_object(path),
            CapabilityCall::SetProperty {
                path,
                property,
                value,
            } => self.capability.set_property(path, property, value),
            CapabilityCall::ExecuteFunction {
                path,
                function,
                parameters,
            } => {
                let args = parameters.iter().cloned().map(Argument::Text).collect();
                self.capability.execute_function(path, function, args)
            }
        };

        match outcome {
            Ok(result) => {
                debug!(%kind, id = %id, path = call.path(), "capability call answered");
                ResponseEnvelope::returned(kind, id.clone(), result)
            }
            Err(err) => {
                Counters::bump(&self.counters.failures);
                warn!(%kind, id = %id, path = call.path(), error = %err, "capability call failed");
                ResponseEnvelope::failed(kind, id.clone(), err.to_string())
            }
        }
    }

    fn subscribe(self: &Arc<Self>, event_name: &str) -> bool {
        let weak = Arc::downgrade(self);
        let name = event_name.to_string();
        let forward: EventCallback = Arc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            match inner.post(&ResponseEnvelope::event(name.as_str())) {
                Ok(()) => Counters::bump(&inner.counters.events_forwarded),
                Err(err) => warn!(event = %name, error = %err, "failed to forward event"),
            }
        });

        let args = vec![
            Argument::Text(event_name.to_string()),
            Argument::Callback(forward),
        ];
        match self
            .capability
            .execute_function(DOCUMENT_PATH, ADD_EVENT_LISTENER, args)
        {
            Ok(_) => {
                Counters::bump(&self.counters.subscriptions);
                info!(event = %event_name, "event subscription bridged");
                true
            }
            Err(err) => {
                Counters::bump(&self.counters.failures);
                warn!(event = %event_name, error = %err, "event subscription failed");
                false
            }
        }
    }

    fn post(&self, response: &ResponseEnvelope) -> Result<()> {
        let data = encode(response)?;
        self.parent
            .post_message(data, &self.origin, &self.config.target_origin)?;
        Ok(())
    }
}
