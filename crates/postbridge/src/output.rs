use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use postbridge_envelope::ResponseEnvelope;
use postbridge_peer::DispatcherStats;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    kind: &'a str,
    correlation_id: &'a str,
    result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: String,
}

pub fn print_response(response: &ResponseEnvelope, format: OutputFormat) {
    let result = response.result_value().to_json();
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                kind: response.kind.as_str(),
                correlation_id: response.correlation_id.as_str(),
                result,
                error: response.error.as_deref(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "CORRELATION ID", "RESULT", "ERROR"])
                .add_row(vec![
                    response.kind.to_string(),
                    response.correlation_id.to_string(),
                    result.to_string(),
                    response.error.clone().unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match &response.error {
            Some(error) => println!(
                "type={} id={} error={}",
                response.kind, response.correlation_id, error
            ),
            None => println!(
                "type={} id={} result={}",
                response.kind,
                response.correlation_id,
                serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
            ),
        },
    }
}

/// Render dispatcher counters for the end-of-input summary.
pub fn stats_table(stats: &DispatcherStats) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["COUNTER", "VALUE"]);
    for (name, value) in [
        ("received", stats.received),
        ("responses", stats.responses),
        ("failures", stats.failures),
        ("subscriptions", stats.subscriptions),
        ("events_forwarded", stats.events_forwarded),
        ("skipped", stats.skipped),
        ("noise", stats.noise),
        ("rejected", stats.rejected),
    ] {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    table
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
