use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use postbridge_channel::{ListenerId, MessageEvent, MessageTarget, Window};
use postbridge_envelope::{
    decode_response, encode, CallEnvelope, CorrelationId, Inbound, NoiseReason, PropertyValue,
    ResponseEnvelope,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::capability::EventCallback;
use crate::config::BridgeConfig;
use crate::embed::{require_frame, FrameElement};
use crate::error::{BridgeError, Result};

/// Catch-all hook invoked with the name of every inbound event.
pub type EventHook = Arc<dyn Fn(&str) + Send + Sync>;

/// What the host side did with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// A pending call was resolved and removed.
    Resolved(CorrelationId),
    /// A return envelope with no pending call (late, duplicate or foreign).
    Unmatched(CorrelationId),
    /// An event envelope was routed.
    Event {
        name: String,
        hook: bool,
        listener: bool,
    },
    /// Not a response envelope.
    Ignored(NoiseReason),
}

/// Host-side end of the bridge.
///
/// Every call mints a fresh correlation id, registers a single-shot waiter
/// under it and posts a call envelope into the frame. The message listener
/// installed on the host window resolves and removes the waiter when the
/// matching response arrives. Responses may come back in any order.
///
/// Dropping the proxy detaches its listener from the host window.
pub struct CallerProxy {
    inner: Arc<CallerInner>,
    listener: ListenerId,
}

struct CallerInner {
    content: Window,
    host: Window,
    config: BridgeConfig,
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<ResponseEnvelope>>>,
    listeners: Mutex<HashMap<String, EventCallback>>,
    event_hook: Mutex<Option<EventHook>>,
}

impl CallerProxy {
    /// Bridge into `frame`, listening on the window that owns the element.
    pub fn new(frame: Option<&FrameElement>) -> Result<Self> {
        Self::with_config(frame, None, BridgeConfig::default())
    }

    /// Bridge into `frame` with an explicit host window and config.
    pub fn with_config(
        frame: Option<&FrameElement>,
        host: Option<Window>,
        config: BridgeConfig,
    ) -> Result<Self> {
        let (frame, content) = require_frame(frame)?;
        let host = host.unwrap_or_else(|| frame.owner().clone());

        let inner = Arc::new(CallerInner {
            content: content.clone(),
            host: host.clone(),
            config,
            pending: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            event_hook: Mutex::new(None),
        });

        let weak: Weak<CallerInner> = Arc::downgrade(&inner);
        let listener = host.add_message_listener(move |event| {
            let Some(inner) = weak.upgrade() else { return };
            if let Err(err) = inner.handle_message(event) {
                warn!(error = %err, origin = %event.origin, "inbound message rejected");
            }
        });

        debug!(
            host = %host.origin(),
            frame = %content.origin(),
            "caller proxy attached"
        );
        Ok(Self { inner, listener })
    }

    /// Install the catch-all event hook, replacing any previous one.
    pub fn with_event_hook<F>(self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *lock(&self.inner.event_hook) = Some(Arc::new(hook));
        self
    }

    /// Read the object at `path` in the remote graph.
    pub async fn get_object(&self, path: &str) -> Result<ResponseEnvelope> {
        self.call(|id| CallEnvelope::get_object(id, path)).await
    }

    /// Assign `property` on the object at `path`.
    pub async fn set_property(
        &self,
        path: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<ResponseEnvelope> {
        let value = value.into();
        self.call(|id| CallEnvelope::set_property(id, path, property, value))
            .await
    }

    /// Invoke `function` on the object at `path` with string parameters.
    pub async fn execute_function<I, S>(
        &self,
        path: &str,
        function: &str,
        parameters: I,
    ) -> Result<ResponseEnvelope>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parameters: Vec<String> = parameters.into_iter().map(Into::into).collect();
        self.call(|id| CallEnvelope::execute_function(id, path, function, parameters))
            .await
    }

    /// Subscribe to a remote event.
    ///
    /// Fire-and-forget: nothing confirms the frame accepted the
    /// subscription. Registering a name again replaces its callback.
    pub fn add_listener<F>(&self, event_name: &str, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.post(&CallEnvelope::add_listener(event_name))?;
        lock(&self.inner.listeners).insert(event_name.to_string(), Arc::new(callback));
        Ok(())
    }

    /// Forget the local callback for `event_name`. The remote subscription
    /// stays in place; its events are simply no longer delivered.
    pub fn remove_listener(&self, event_name: &str) -> bool {
        lock(&self.inner.listeners).remove(event_name).is_some()
    }

    /// Route one inbound message. Normally driven by the host window.
    pub fn handle_message(&self, event: &MessageEvent) -> Result<Handled> {
        self.inner.handle_message(event)
    }

    /// Number of calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Event names with a registered callback, sorted.
    pub fn listener_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.listeners).keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Abandon every pending call. Waiting callers fail with
    /// [`BridgeError::Disconnected`].
    pub fn cancel_pending(&self) -> usize {
        let drained: Vec<_> = lock(&self.inner.pending).drain().collect();
        drained.len()
    }

    pub fn host(&self) -> &Window {
        &self.inner.host
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    async fn call<F>(&self, build: F) -> Result<ResponseEnvelope>
    where
        F: FnOnce(CorrelationId) -> CallEnvelope,
    {
        let (id, waiter) = self.inner.register_pending();
        let _guard = PendingGuard {
            inner: &self.inner,
            id: id.clone(),
        };

        let envelope = build(id.clone());
        self.inner.post(&envelope)?;
        debug!(method = %envelope.method, id = %id, "call posted");

        let outcome = match self.inner.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, waiter)
                .await
                .map_err(|_| BridgeError::Timeout(limit))?,
            None => waiter.await,
        };
        outcome.map_err(|_| BridgeError::Disconnected(format!("call {id} abandoned")))
    }
}

impl Drop for CallerProxy {
    fn drop(&mut self) {
        self.inner.host.remove_message_listener(self.listener);
    }
}

impl fmt::Debug for CallerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerProxy")
            .field("host", &self.inner.host.origin())
            .field("frame", &self.inner.content.origin())
            .field("config", &self.inner.config)
            .field("pending_calls", &self.pending_calls())
            .field("listeners", &self.listener_names())
            .finish()
    }
}

impl CallerInner {
    fn register_pending(&self) -> (CorrelationId, oneshot::Receiver<ResponseEnvelope>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = lock(&self.pending);
        loop {
            let id = CorrelationId::mint();
            if let Entry::Vacant(slot) = pending.entry(id.clone()) {
                slot.insert(tx);
                return (id, rx);
            }
        }
    }

    fn post(&self, envelope: &CallEnvelope) -> Result<()> {
        let data = encode(envelope)?;
        self.content
            .post_message(data, self.host.origin(), &self.config.target_origin)?;
        Ok(())
    }

    fn handle_message(&self, event: &MessageEvent) -> Result<Handled> {
        self.config.accepted_origins.check(&event.origin)?;

        let response = match decode_response(&event.data) {
            Inbound::Envelope(response) => response,
            Inbound::Noise(reason) => {
                debug!(?reason, origin = %event.origin, "ignoring non-response message");
                return Ok(Handled::Ignored(reason));
            }
        };

        if response.kind.is_return() {
            return Ok(self.resolve(response));
        }

        let Some(name) = response.event_name else {
            debug!("event envelope without event name ignored");
            return Ok(Handled::Ignored(NoiseReason::Malformed(
                "event without eventName".to_string(),
            )));
        };

        // Clone out of the locks so callbacks may re-enter the proxy.
        let hook = lock(&self.event_hook).clone();
        let listener = lock(&self.listeners).get(&name).cloned();

        if let Some(hook) = &hook {
            hook(&name);
        }
        if let Some(listener) = &listener {
            listener();
        }
        debug!(event = %name, hook = hook.is_some(), listener = listener.is_some(), "event routed");

        Ok(Handled::Event {
            name,
            hook: hook.is_some(),
            listener: listener.is_some(),
        })
    }

    fn resolve(&self, response: ResponseEnvelope) -> Handled {
        let waiter = lock(&self.pending).remove(response.correlation_id.as_str());
        let id = response.correlation_id.clone();
        match waiter {
            Some(waiter) => {
                if waiter.send(response).is_err() {
                    debug!(id = %id, "caller stopped waiting before response arrived");
                }
                Handled::Resolved(id)
            }
            None => {
                debug!(id = %id, kind = %response.kind, "no pending call for response");
                Handled::Unmatched(id)
            }
        }
    }
}

/// Removes a pending entry when its call finishes by any path other than
/// resolution (timeout, post failure, the future being dropped).
struct PendingGuard<'a> {
    inner: &'a CallerInner,
    id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.inner.pending).remove(&self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
