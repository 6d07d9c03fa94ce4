use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use postbridge_channel::{MessageTarget, TargetOrigin, Window};
use postbridge_envelope::{
    decode_call, encode, CallEnvelope, Method, PropertyValue, RemoteValue, ResponseEnvelope,
    ResponseKind,
};
use postbridge_peer::{
    BridgeConfig, BridgeError, CalleeDispatcher, CallerProxy, FrameElement, JsonDocument,
};
use serde_json::{json, Value};

const HOST: &str = "https://host.example";
const EDITOR: &str = "https://editor.example";

struct Bridge {
    host: Window,
    frame: Window,
    document: Arc<JsonDocument>,
    dispatcher: CalleeDispatcher,
    proxy: Arc<CallerProxy>,
}

fn sample_document() -> Value {
    json!({
        "title": "Quarterly report",
        "page": [
            {"element": []},
            {"element": [{"x": 0, "y": 0}, {"x": 1, "y": 1}, {"x": 10, "y": 20}]}
        ]
    })
}

fn bridge_with(host_config: BridgeConfig, frame_config: BridgeConfig) -> Bridge {
    let host = Window::spawn(HOST).expect("host window should spawn");
    let frame = Window::spawn(EDITOR).expect("frame window should spawn");
    let document = Arc::new(JsonDocument::new(sample_document()));
    let dispatcher = CalleeDispatcher::install(
        &frame,
        Arc::new(host.clone()),
        document.clone(),
        frame_config,
    );
    let element = FrameElement::iframe(&host, "https://editor.example/index.html", &frame);
    let proxy = CallerProxy::with_config(Some(&element), None, host_config)
        .expect("proxy should attach to a complete iframe");
    Bridge {
        host,
        frame,
        document,
        dispatcher,
        proxy: Arc::new(proxy),
    }
}

fn bridge() -> Bridge {
    bridge_with(BridgeConfig::default(), BridgeConfig::default())
}

/// A frame with no dispatcher; the test answers calls by hand.
struct ManualFrame {
    host: Window,
    proxy: Arc<CallerProxy>,
    calls: Arc<Mutex<Vec<CallEnvelope>>>,
    frame: Window,
}

fn manual_frame() -> ManualFrame {
    let host = Window::spawn(HOST).expect("host window should spawn");
    let frame = Window::spawn(EDITOR).expect("frame window should spawn");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    frame.add_message_listener(move |event| {
        if let Some(call) = decode_call(&event.data).envelope() {
            sink.lock().expect("call log lock").push(call);
        }
    });
    let element = FrameElement::iframe(&host, "https://editor.example/index.html", &frame);
    let proxy = CallerProxy::new(Some(&element)).expect("proxy should attach");
    ManualFrame {
        host,
        proxy: Arc::new(proxy),
        calls,
        frame,
    }
}

impl ManualFrame {
    async fn wait_for_calls(&self, count: usize) -> Vec<CallEnvelope> {
        for _ in 0..100 {
            tokio::task::yield_now().await;
            self.frame.settled().await;
            let calls = self.calls.lock().expect("call log lock").clone();
            if calls.len() >= count {
                return calls;
            }
        }
        panic!("frame did not receive {count} calls");
    }

    async fn reply(&self, response: &ResponseEnvelope) {
        self.host
            .post_message(
                encode(response).expect("response should encode"),
                EDITOR,
                &TargetOrigin::Any,
            )
            .expect("host window should accept replies");
        self.host.settled().await;
    }
}

#[tokio::test]
async fn get_object_round_trip() {
    let bridge = bridge();

    let response = bridge
        .proxy
        .get_object("page.1.element.2")
        .await
        .expect("call should resolve");

    assert_eq!(response.kind, ResponseKind::ReturnObject);
    assert_eq!(response.result_value().to_json(), json!({"x": 10, "y": 20}));
    assert!(!response.correlation_id.is_event_sentinel());
    assert_eq!(bridge.proxy.pending_calls(), 0);
}

#[tokio::test]
async fn set_property_and_execute_function_round_trip() {
    let bridge = bridge();

    let set = bridge
        .proxy
        .set_property("page.1.element.2", "x", 99i64)
        .await
        .expect("set should resolve");
    assert_eq!(set.kind, ResponseKind::ReturnProperty);
    assert_eq!(set.result, Some(RemoteValue::Primitive(PropertyValue::from(99i64))));
    assert_eq!(bridge.document.snapshot()["page"][1]["element"][2]["x"], json!(99));

    let keys = bridge
        .proxy
        .execute_function("page.1.element.2", "Keys", Vec::<String>::new())
        .await
        .expect("exec should resolve");
    assert_eq!(keys.kind, ResponseKind::ReturnFunction);
    assert_eq!(keys.result_value().to_json(), json!(["x", "y"]));
}

#[tokio::test]
async fn single_element_array_result_stays_structured() {
    let bridge = bridge();

    let keys = bridge
        .proxy
        .execute_function("page.0", "Keys", Vec::<String>::new())
        .await
        .expect("exec should resolve");

    assert_eq!(keys.result, Some(RemoteValue::Structured(json!(["element"]))));
    assert_eq!(keys.result_value().to_json(), json!(["element"]));
}

#[tokio::test]
async fn capability_failure_resolves_with_error() {
    let bridge = bridge();

    let response = bridge
        .proxy
        .execute_function("page", "Explode", ["now"])
        .await
        .expect("failed capability call should still resolve");

    assert!(response.is_error());
    assert!(response.result.is_none());
    assert_eq!(bridge.dispatcher.stats().failures, 1);
}

#[tokio::test]
async fn concurrent_calls_get_distinct_ids_and_own_results() {
    let bridge = bridge();

    let mut tasks = Vec::new();
    for index in 0..3 {
        let proxy = Arc::clone(&bridge.proxy);
        tasks.push(tokio::spawn(async move {
            let path = format!("page.1.element.{index}");
            (index, proxy.get_object(&path).await)
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let (index, response) = task.await.expect("task should not panic");
        let response = response.expect("call should resolve");
        let (x, y) = [(0, 0), (1, 1), (10, 20)][index];
        assert_eq!(response.result_value().to_json(), json!({"x": x, "y": y}));
        assert!(ids.insert(response.correlation_id.clone()));
    }
    assert_eq!(ids.len(), 3);
    assert_eq!(bridge.proxy.pending_calls(), 0);
}

#[tokio::test]
async fn duplicate_response_is_ignored() {
    let frame = manual_frame();
    let proxy = Arc::clone(&frame.proxy);
    let call = tokio::spawn(async move { proxy.get_object("page").await });

    let calls = frame.wait_for_calls(1).await;
    let response = ResponseEnvelope::returned(
        ResponseKind::ReturnObject,
        calls[0].correlation_id.clone(),
        RemoteValue::from_json(json!({"first": true})),
    );
    frame.reply(&response).await;
    let duplicate = ResponseEnvelope::returned(
        ResponseKind::ReturnObject,
        calls[0].correlation_id.clone(),
        RemoteValue::from_json(json!({"second": true})),
    );
    frame.reply(&duplicate).await;

    let resolved = call
        .await
        .expect("task should not panic")
        .expect("call should resolve");
    assert_eq!(resolved.result_value().to_json(), json!({"first": true}));
    assert_eq!(frame.proxy.pending_calls(), 0);
}

#[tokio::test]
async fn responses_resolve_in_arrival_order() {
    let frame = manual_frame();

    let proxy = Arc::clone(&frame.proxy);
    let first = tokio::spawn(async move { proxy.get_object("a").await });
    frame.wait_for_calls(1).await;
    let proxy = Arc::clone(&frame.proxy);
    let second = tokio::spawn(async move { proxy.get_object("b").await });
    let calls = frame.wait_for_calls(2).await;
    assert_eq!(calls[0].path.as_deref(), Some("a"));
    assert_eq!(calls[1].path.as_deref(), Some("b"));

    frame
        .reply(&ResponseEnvelope::returned(
            ResponseKind::ReturnObject,
            calls[1].correlation_id.clone(),
            RemoteValue::from(PropertyValue::from("B")),
        ))
        .await;
    let b = second
        .await
        .expect("task should not panic")
        .expect("b should resolve");
    assert_eq!(b.result_value(), RemoteValue::Primitive("B".into()));
    assert!(!first.is_finished());
    assert_eq!(frame.proxy.pending_calls(), 1);

    frame
        .reply(&ResponseEnvelope::returned(
            ResponseKind::ReturnObject,
            calls[0].correlation_id.clone(),
            RemoteValue::from(PropertyValue::from("A")),
        ))
        .await;
    let a = first
        .await
        .expect("task should not panic")
        .expect("a should resolve");
    assert_eq!(a.result_value(), RemoteValue::Primitive("A".into()));
}

#[tokio::test]
async fn channel_noise_leaves_pending_calls_alone() {
    let frame = manual_frame();
    let proxy = Arc::clone(&frame.proxy);
    let call = tokio::spawn(async move { proxy.get_object("page").await });
    let calls = frame.wait_for_calls(1).await;

    for noise in [
        json!("hello"),
        json!({"type": "Teleport", "correlationId": calls[0].correlation_id.as_str()}),
        json!({"type": "ReturnObject", "correlationId": "someone-else"}),
        json!({"method": "GetObject", "correlationId": "x", "path": "y"}),
    ] {
        frame
            .host
            .post_message(noise, EDITOR, &TargetOrigin::Any)
            .expect("host should accept noise");
    }
    frame.host.settled().await;
    assert_eq!(frame.proxy.pending_calls(), 1);
    assert!(!call.is_finished());

    assert_eq!(frame.proxy.cancel_pending(), 1);
    let outcome = call.await.expect("task should not panic");
    assert!(matches!(outcome, Err(BridgeError::Disconnected(_))));
}

#[tokio::test]
async fn event_reaches_listener_and_hook() {
    let host = Window::spawn(HOST).expect("host window should spawn");
    let frame = Window::spawn(EDITOR).expect("frame window should spawn");
    let document = Arc::new(JsonDocument::new(sample_document()));
    let _dispatcher = CalleeDispatcher::install(
        &frame,
        Arc::new(host.clone()),
        document.clone(),
        BridgeConfig::default(),
    );

    let hooked = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&hooked);
    let element = FrameElement::iframe(&host, "https://editor.example/index.html", &frame);
    let proxy = CallerProxy::new(Some(&element))
        .expect("proxy should attach")
        .with_event_hook(move |name| sink.lock().expect("hook lock").push(name.to_string()));

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    proxy
        .add_listener("selectionChanged", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("subscription should post");
    frame.settled().await;
    assert_eq!(document.subscribed_events(), vec!["selectionChanged".to_string()]);

    assert!(document.fire("selectionChanged"));
    host.settled().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(
        *hooked.lock().expect("hook lock"),
        vec!["selectionChanged".to_string()]
    );
}

#[tokio::test]
async fn relistening_replaces_callback() {
    let bridge = bridge();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    for counter in [&first, &second] {
        let counter = Arc::clone(counter);
        bridge
            .proxy
            .add_listener("click", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("subscription should post");
    }
    bridge.frame.settled().await;
    assert_eq!(bridge.dispatcher.stats().subscriptions, 2);

    bridge.document.fire("click");
    bridge.document.fire("click");
    bridge.host.settled().await;

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn set_property_without_value_is_not_dispatched() {
    let bridge = bridge();

    bridge
        .frame
        .post_message(
            json!({
                "method": "SetProperty",
                "correlationId": "c-missing-value",
                "path": "page.1.element.2",
                "property": "width"
            }),
            HOST,
            &TargetOrigin::Any,
        )
        .expect("frame should accept the envelope");
    bridge.frame.settled().await;

    let stats = bridge.dispatcher.stats();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.responses, 0);
    assert_eq!(
        bridge.document.snapshot()["page"][1]["element"][2],
        json!({"x": 10, "y": 20})
    );

    // The dispatcher keeps serving afterwards.
    let response = bridge
        .proxy
        .get_object("title")
        .await
        .expect("call should resolve");
    assert_eq!(response.result_value(), RemoteValue::Primitive("Quarterly report".into()));
}

#[tokio::test]
async fn timeout_bounds_unanswered_call() {
    let host = Window::spawn(HOST).expect("host window should spawn");
    let frame = Window::spawn(EDITOR).expect("frame window should spawn");
    let element = FrameElement::iframe(&host, "https://editor.example/index.html", &frame);
    let proxy = CallerProxy::with_config(
        Some(&element),
        None,
        BridgeConfig::default().with_call_timeout(Duration::from_millis(50)),
    )
    .expect("proxy should attach");

    let outcome = proxy.get_object("page").await;
    assert!(matches!(
        outcome,
        Err(BridgeError::Timeout(limit)) if limit == Duration::from_millis(50)
    ));
    assert_eq!(proxy.pending_calls(), 0);
}

#[tokio::test]
async fn restricted_bridge_round_trips_and_drops_strangers() {
    let bridge = bridge_with(BridgeConfig::restricted(EDITOR), BridgeConfig::restricted(HOST));

    let response = bridge
        .proxy
        .get_object("title")
        .await
        .expect("restricted call should resolve");
    assert_eq!(response.kind, ResponseKind::ReturnObject);

    // A stranger posting into the frame is refused before dispatch.
    bridge
        .frame
        .post_message(
            encode(&CallEnvelope::get_object("evil-1".into(), "title")).expect("encode"),
            "https://evil.example",
            &TargetOrigin::Any,
        )
        .expect("frame should accept the post");
    bridge.frame.settled().await;
    let stats = bridge.dispatcher.stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.responses, 1);
}

#[tokio::test]
async fn exact_target_origin_drops_mismatched_frame() {
    let host = Window::spawn(HOST).expect("host window should spawn");
    let frame = Window::spawn("https://other.example").expect("frame window should spawn");
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    frame.add_message_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let element = FrameElement::iframe(&host, "https://other.example/", &frame);
    let proxy = CallerProxy::with_config(Some(&element), None, BridgeConfig::restricted(EDITOR))
        .expect("proxy should attach");
    proxy.add_listener("anything", || {}).expect("post succeeds silently");
    frame.settled().await;

    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn add_listener_envelope_uses_sentinel() {
    let frame = manual_frame();
    frame
        .proxy
        .add_listener("pageAdded", || {})
        .expect("subscription should post");
    let calls = frame.wait_for_calls(1).await;
    assert_eq!(calls[0].method, Method::AddListener);
    assert!(calls[0].correlation_id.is_event_sentinel());
    assert_eq!(calls[0].event_name.as_deref(), Some("pageAdded"));
}
