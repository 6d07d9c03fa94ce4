use std::fs;
use std::sync::Arc;

use postbridge_channel::Window;
use postbridge_envelope::{PropertyValue, ResponseEnvelope};
use postbridge_peer::{BridgeConfig, CalleeDispatcher, CallerProxy, FrameElement, JsonDocument};

use crate::cmd::{load_document, parse_duration, CallArgs, CallOperation};
use crate::exit::{bridge_error, io_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_response, OutputFormat};

const HOST_ORIGIN: &str = "postbridge://host";
const FRAME_ORIGIN: &str = "postbridge://frame";
const FRAME_SRC: &str = "postbridge://frame/document";

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let document = Arc::new(load_document(&args.document)?);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    let host_config = BridgeConfig::restricted(FRAME_ORIGIN).with_call_timeout(timeout);
    let response = runtime.block_on(issue(&args.operation, Arc::clone(&document), host_config))?;

    print_response(&response, format);

    if args.save {
        save_document(&args, &document)?;
    }

    Ok(if response.is_error() { FAILURE } else { SUCCESS })
}

async fn issue(
    operation: &CallOperation,
    document: Arc<JsonDocument>,
    host_config: BridgeConfig,
) -> CliResult<ResponseEnvelope> {
    let host = Window::spawn(HOST_ORIGIN)
        .map_err(|err| CliError::new(INTERNAL, format!("host window: {err}")))?;
    let frame = Window::spawn(FRAME_ORIGIN)
        .map_err(|err| CliError::new(INTERNAL, format!("frame window: {err}")))?;

    let _dispatcher = CalleeDispatcher::install(
        &frame,
        Arc::new(host.clone()),
        document,
        BridgeConfig::restricted(HOST_ORIGIN),
    );
    let element = FrameElement::iframe(&host, FRAME_SRC, &frame);
    let proxy = CallerProxy::with_config(Some(&element), None, host_config)
        .map_err(|err| bridge_error("bridge setup failed", err))?;

    let response = match operation {
        CallOperation::Get { path } => proxy.get_object(path).await,
        CallOperation::Set {
            path,
            property,
            value,
        } => {
            proxy
                .set_property(path, property, parse_property_value(value))
                .await
        }
        CallOperation::Exec {
            path,
            function,
            parameters,
        } => {
            proxy
                .execute_function(path, function, parameters.iter().map(String::as_str))
                .await
        }
    };

    let response = response.map_err(|err| bridge_error("call failed", err))?;
    if let Some(error) = &response.error {
        tracing::warn!(id = %response.correlation_id, error = %error, "call answered with error");
    }
    Ok(response)
}

/// Interpret VALUE as a JSON primitive, falling back to plain text.
fn parse_property_value(raw: &str) -> PropertyValue {
    serde_json::from_str::<PropertyValue>(raw)
        .unwrap_or_else(|_| PropertyValue::Text(raw.to_string()))
}

fn save_document(args: &CallArgs, document: &JsonDocument) -> CliResult<()> {
    let text = serde_json::to_string_pretty(&document.snapshot())
        .map_err(|err| CliError::new(INTERNAL, format!("failed encoding document: {err}")))?;
    fs::write(&args.document, text + "\n")
        .map_err(|err| io_error(&format!("failed writing {}", args.document.display()), err))
}
