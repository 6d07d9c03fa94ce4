//! Host and frame in one process: a caller proxy drives a JSON document
//! through a callee dispatcher and listens for one of its events.
//!
//! Run with:
//!   cargo run --example loopback

use std::sync::Arc;
use std::time::Duration;

use postbridge::channel::Window;
use postbridge::peer::{BridgeConfig, CalleeDispatcher, CallerProxy, FrameElement, JsonDocument};
use serde_json::json;

const HOST: &str = "https://host.example";
const EDITOR: &str = "https://editor.example";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = Window::spawn(HOST)?;
    let frame = Window::spawn(EDITOR)?;

    let document = Arc::new(JsonDocument::new(json!({
        "title": "Loopback",
        "page": [{"element": [{"x": 10, "y": 20}]}]
    })));
    let _dispatcher = CalleeDispatcher::install(
        &frame,
        Arc::new(host.clone()),
        document.clone(),
        BridgeConfig::restricted(HOST),
    );

    let element = FrameElement::iframe(&host, "https://editor.example/index.html", &frame);
    let proxy = CallerProxy::with_config(
        Some(&element),
        None,
        BridgeConfig::restricted(EDITOR).with_call_timeout(Duration::from_secs(2)),
    )?
    .with_event_hook(|name| eprintln!("hook saw event {name}"));

    let object = proxy.get_object("page.0.element.0").await?;
    eprintln!("{} -> {}", object.kind, object.result_value().to_json());

    let set = proxy.set_property("title", "text", "ignored").await?;
    eprintln!("set on a string node answered with error: {:?}", set.error);

    proxy.add_listener("saved", || eprintln!("listener saw saved"))?;
    frame.settled().await;
    proxy
        .execute_function("document", "FireEvent", ["saved"])
        .await?;
    host.settled().await;

    eprintln!("document now: {}", document.snapshot());
    Ok(())
}
