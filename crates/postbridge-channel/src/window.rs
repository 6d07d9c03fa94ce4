use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{ChannelError, Result};
use crate::origin::{TargetOrigin, WILDCARD};
use crate::traits::{MessageEvent, MessageListener, MessageTarget};

/// Handle returned by [`Window::add_message_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum Queued {
    Message(MessageEvent),
    Barrier(oneshot::Sender<()>),
}

/// In-memory browsing context.
///
/// Posting a message only enqueues it. A pump task on the Tokio runtime
/// drains the queue and hands each message to every registered listener,
/// one message at a time, so listeners never run concurrently with
/// themselves and never re-enter from inside `post_message`.
///
/// Cloning yields another handle to the same window.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

struct WindowInner {
    origin: String,
    listeners: Mutex<Vec<(ListenerId, MessageListener)>>,
    queue: mpsc::UnboundedSender<Queued>,
    closed: AtomicBool,
    next_listener_id: AtomicU64,
}

impl Window {
    /// Create a window at `origin` and start its event loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        if origin.trim().is_empty() || origin == WILDCARD {
            return Err(ChannelError::InvalidOrigin(origin));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let (queue, mut rx) = mpsc::unbounded_channel();
        let inner = Arc::new(WindowInner {
            origin,
            listeners: Mutex::new(Vec::new()),
            queue,
            closed: AtomicBool::new(false),
            next_listener_id: AtomicU64::new(1),
        });

        let weak: Weak<WindowInner> = Arc::downgrade(&inner);
        runtime.spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    Queued::Message(event) => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.deliver(&event);
                    }
                    Queued::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        debug!(origin = %inner.origin, "window opened");
        Ok(Self { inner })
    }

    /// Origin of the document loaded in this window.
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Register a listener for every message delivered after this call.
    pub fn add_message_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MessageEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Stop accepting messages. Already queued messages are still delivered.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!(origin = %self.inner.origin, "window closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Wait until every message queued before this call has been delivered.
    pub async fn settled(&self) {
        let (done, wait) = oneshot::channel();
        if self.inner.queue.send(Queued::Barrier(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Returns true if both handles refer to the same window.
    pub fn same_window(&self, other: &Window) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl WindowInner {
    fn deliver(&self, event: &MessageEvent) {
        // Snapshot so listeners may add or remove listeners while running.
        let listeners: Vec<MessageListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(
            origin = %self.origin,
            from = %event.origin,
            listeners = listeners.len(),
            "delivering message"
        );
        for listener in listeners {
            listener(event);
        }
    }
}

impl MessageTarget for Window {
    fn post_message(
        &self,
        data: Value,
        sender_origin: &str,
        target_origin: &TargetOrigin,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if !target_origin.matches(&self.inner.origin) {
            debug!(
                window = %self.inner.origin,
                target = %target_origin,
                "target origin mismatch, message dropped"
            );
            return Ok(());
        }
        self.inner
            .queue
            .send(Queued::Message(MessageEvent::new(sender_origin, data)))
            .map_err(|_| ChannelError::Closed)
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("origin", &self.inner.origin)
            .field("closed", &self.is_closed())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn delivers_in_post_order() {
        let window = Window::spawn("https://host.example").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        window.add_message_listener(move |event| {
            sink.lock().unwrap().push(event.data.clone());
        });

        for n in 0..5 {
            window
                .post_message(json!(n), "https://frame.example", &TargetOrigin::Any)
                .unwrap();
        }
        window.settled().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![json!(0), json!(1), json!(2), json!(3), json!(4)]
        );
    }

    #[tokio::test]
    async fn post_does_not_run_listeners_inline() {
        let window = Window::spawn("https://host.example").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        window.add_message_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        window
            .post_message(json!({}), "https://frame.example", &TargetOrigin::Any)
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        window.settled().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sender_origin_is_reported() {
        let window = Window::spawn("https://host.example").unwrap();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        window.add_message_listener(move |event| {
            *sink.lock().unwrap() = Some(event.origin.clone());
        });

        window
            .post_message(json!(1), "https://frame.example", &TargetOrigin::Any)
            .unwrap();
        window.settled().await;

        assert_eq!(seen.lock().unwrap().as_deref(), Some("https://frame.example"));
    }

    #[tokio::test]
    async fn mismatched_target_origin_is_dropped() {
        let window = Window::spawn("https://host.example").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        window.add_message_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let wrong = TargetOrigin::Exact("https://other.example".to_string());
        window
            .post_message(json!(1), "https://frame.example", &wrong)
            .unwrap();
        window.settled().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn removed_listener_stops_receiving() {
        let window = Window::spawn("https://host.example").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = window.add_message_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(window.remove_message_listener(id));
        assert!(!window.remove_message_listener(id));
        window
            .post_message(json!(1), "https://frame.example", &TargetOrigin::Any)
            .unwrap();
        window.settled().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn closed_window_rejects_posts() {
        let window = Window::spawn("https://host.example").unwrap();
        window.close();
        assert_eq!(
            window.post_message(json!(1), "https://frame.example", &TargetOrigin::Any),
            Err(ChannelError::Closed)
        );
    }

    #[tokio::test]
    async fn wildcard_is_not_a_window_origin() {
        assert!(matches!(
            Window::spawn("*"),
            Err(ChannelError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        assert!(matches!(
            Window::spawn("https://host.example"),
            Err(ChannelError::NoRuntime)
        ));
    }
}
