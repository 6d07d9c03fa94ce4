use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use postbridge_peer::JsonDocument;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod dispatch;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue one call against a document through an in-process bridge.
    Call(CallArgs),
    /// Answer call envelopes read from stdin, one JSON object per line.
    Dispatch(DispatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Dispatch(args) => dispatch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// JSON document the frame exposes.
    #[arg(long, env = "POSTBRIDGE_DOCUMENT", value_name = "FILE")]
    pub document: PathBuf,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Write the document back to FILE after the call.
    #[arg(long)]
    pub save: bool,
    #[command(subcommand)]
    pub operation: CallOperation,
}

#[derive(Subcommand, Debug)]
pub enum CallOperation {
    /// Read the object at PATH.
    Get {
        path: String,
    },
    /// Assign PROPERTY on the object at PATH. VALUE is parsed as JSON
    /// (true, 42, "text") and falls back to a plain string.
    Set {
        path: String,
        property: String,
        value: String,
    },
    /// Invoke FUNCTION on the object at PATH with string parameters.
    Exec {
        path: String,
        function: String,
        parameters: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// JSON document the frame exposes.
    #[arg(long, env = "POSTBRIDGE_DOCUMENT", value_name = "FILE")]
    pub document: PathBuf,
    /// Only accept input from this origin and address responses to it.
    /// Lines may name their sender as {"origin": ..., "data": ...}.
    #[arg(long, value_name = "ORIGIN")]
    pub origin: Option<String>,
    /// Origin attributed to bare input lines.
    #[arg(long, value_name = "ORIGIN", default_value = dispatch::DEFAULT_HOST_ORIGIN)]
    pub host_origin: String,
    /// Validate call envelopes against the built-in schemas before dispatch.
    #[arg(long)]
    pub validate: bool,
    /// Directory of per-method schemas (<Method>.schema.json). Implies --validate.
    #[arg(long, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,
    /// Print dispatcher counters to stderr at end of input.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn load_document(path: &Path) -> CliResult<JsonDocument> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    JsonDocument::from_json_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("{} is not a JSON document: {err}", path.display()),
        )
    })
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
