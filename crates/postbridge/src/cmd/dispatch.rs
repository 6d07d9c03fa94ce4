use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use postbridge_channel::{ChannelError, MessageEvent, MessageTarget, TargetOrigin};
use postbridge_peer::{BridgeConfig, CalleeDispatcher};
#[cfg(feature = "schema")]
use postbridge_schema::EnvelopeValidator;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cmd::{load_document, DispatchArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
#[cfg(feature = "schema")]
use crate::exit::schema_error;
use crate::output::{stats_table, OutputFormat};

/// Origin attributed to input lines that do not name a sender.
pub const DEFAULT_HOST_ORIGIN: &str = "postbridge://host";
/// Origin the dispatcher reports as the sender of its responses.
const FRAME_ORIGIN: &str = "postbridge://frame";

/// Message target writing each envelope as one JSON line.
///
/// The sink stands in for the host window, so it drops envelopes whose
/// target origin does not match `origin`, like a window would.
pub struct LineSink<W> {
    origin: String,
    out: Mutex<W>,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(origin: impl Into<String>, out: W) -> Self {
        Self {
            origin: origin.into(),
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> MessageTarget for LineSink<W> {
    fn post_message(
        &self,
        data: Value,
        sender_origin: &str,
        target_origin: &TargetOrigin,
    ) -> postbridge_channel::Result<()> {
        if !target_origin.matches(&self.origin) {
            debug!(
                target_origin = %target_origin,
                sink = %self.origin,
                "dropping output for other origin"
            );
            return Ok(());
        }
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{data}")
            .and_then(|()| out.flush())
            .map_err(|err| {
                warn!(error = %err, sender = %sender_origin, "output closed");
                ChannelError::Closed
            })
    }
}

pub fn run(args: DispatchArgs, _format: OutputFormat) -> CliResult<i32> {
    let document = Arc::new(load_document(&args.document)?);

    let (config, sink_origin) = match &args.origin {
        Some(origin) => (BridgeConfig::restricted(origin.clone()), origin.clone()),
        None => (BridgeConfig::default(), args.host_origin.clone()),
    };
    let sink = Arc::new(LineSink::new(sink_origin, io::stdout()));
    let dispatcher = CalleeDispatcher::new(document, sink, FRAME_ORIGIN, config);

    #[cfg(feature = "schema")]
    let dispatcher = match load_validator(&args)? {
        Some(validator) => dispatcher.with_validator(Arc::new(validator)),
        None => dispatcher,
    };

    let stdin = io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        if line.trim().is_empty() {
            continue;
        }
        let event = match parse_line(&line, &args.host_origin) {
            Ok(event) => event,
            Err(err) => {
                warn!(line = index + 1, error = %err, "skipping line that is not JSON");
                continue;
            }
        };
        match dispatcher.handle_message(&event) {
            Ok(report) if report.noise.is_some() => {
                debug!(line = index + 1, reason = ?report.noise, "skipping noise");
            }
            Ok(report) => {
                debug!(line = index + 1, dispatched = report.dispatched(), "line handled");
            }
            Err(err) => warn!(line = index + 1, error = %err, "line rejected"),
        }
    }

    let stats = dispatcher.stats();
    info!(
        received = stats.received,
        responses = stats.responses,
        rejected = stats.rejected,
        "end of input"
    );
    if args.stats {
        eprintln!("{}", stats_table(&stats));
    }
    Ok(SUCCESS)
}

#[cfg(feature = "schema")]
fn load_validator(args: &DispatchArgs) -> CliResult<Option<EnvelopeValidator>> {
    match &args.schema_dir {
        Some(dir) => EnvelopeValidator::from_directory(dir)
            .map(Some)
            .map_err(|err| schema_error("schema load failed", err)),
        None if args.validate => EnvelopeValidator::builtin()
            .map(Some)
            .map_err(|err| schema_error("schema load failed", err)),
        None => Ok(None),
    }
}

/// A line is either a bare message or `{"origin": ..., "data": ...}`.
fn parse_line(line: &str, default_origin: &str) -> serde_json::Result<MessageEvent> {
    let value: Value = serde_json::from_str(line)?;
    if let Some(object) = value.as_object() {
        if object.len() == 2 {
            if let (Some(Value::String(origin)), Some(data)) =
                (object.get("origin"), object.get("data"))
            {
                return Ok(MessageEvent::new(origin.clone(), data.clone()));
            }
        }
    }
    Ok(MessageEvent::new(default_origin, value))
}
