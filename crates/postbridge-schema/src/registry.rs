use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use postbridge_envelope::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_value;

const CALL_SCHEMA: &str = include_str!("../schemas/call-envelope.schema.json");
const RESPONSE_SCHEMA: &str = include_str!("../schemas/response-envelope.schema.json");
const SCHEMA_SUFFIX: &str = ".schema.json";

/// Envelope shape being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Call,
    Response,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Call => "call envelope",
            Shape::Response => "response envelope",
        }
    }
}

/// Compiled validators for both envelope shapes plus optional per-method
/// call contracts.
pub struct EnvelopeValidator {
    call: Validator,
    response: Validator,
    methods: HashMap<Method, Validator>,
    config: ValidatorConfig,
}

impl EnvelopeValidator {
    /// Built-in envelope schemas with default config.
    pub fn builtin() -> Result<Self> {
        Self::with_config(ValidatorConfig::default())
    }

    /// Built-in envelope schemas with explicit config.
    pub fn with_config(config: ValidatorConfig) -> Result<Self> {
        let call = compile(&serde_json::from_str(CALL_SCHEMA)?, config.strict_mode)?;
        let response = compile(&serde_json::from_str(RESPONSE_SCHEMA)?, config.strict_mode)?;
        Ok(Self {
            call,
            response,
            methods: HashMap::new(),
            config,
        })
    }

    /// Register an additional schema that calls with `method` must satisfy.
    pub fn register_method_schema(&mut self, method: Method, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_method_value(method, &schema)
    }

    /// Register an additional method schema from a JSON value.
    ///
    /// Method schemas only constrain a subset of envelope fields, so strict
    /// mode is left to the envelope schema and never injected here.
    pub fn register_method_value(&mut self, method: Method, schema: &Value) -> Result<()> {
        let compiled = compile(schema, false)?;
        self.methods.insert(method, compiled);
        Ok(())
    }

    /// Built-in schemas plus method schemas from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, ValidatorConfig::default())
    }

    /// Load `<Method>.schema.json` files (case-insensitive) from a directory.
    pub fn from_directory_with_config(path: &Path, config: ValidatorConfig) -> Result<Self> {
        let mut validator = Self::with_config(config)?;
        let mut loaded_schema_count = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_schema_file = file_name.to_ascii_lowercase().ends_with(SCHEMA_SUFFIX);
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_schema_file {
                    return Err(SchemaError::LoadFailed(format!(
                        "refusing to load schema symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() || !is_schema_file {
                continue;
            }

            let method = resolve_method_from_file_name(&file_name).ok_or_else(|| {
                SchemaError::LoadFailed(format!("unrecognized schema filename: {file_name}"))
            })?;

            loaded_schema_count = loaded_schema_count.saturating_add(1);
            if loaded_schema_count > config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({}): {}",
                    config.max_schemas_from_directory, loaded_schema_count
                )));
            }

            let file = std::fs::File::open(&entry_path).map_err(|err| {
                SchemaError::LoadFailed(format!(
                    "failed opening schema {}: {err}",
                    entry_path.display()
                ))
            })?;
            let opened_metadata = file
                .metadata()
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

            #[cfg(unix)]
            {
                if !same_file_identity(&path_metadata, &opened_metadata) {
                    return Err(SchemaError::LoadFailed(format!(
                        "schema file changed during load: {file_name}"
                    )));
                }
            }

            if opened_metadata.len() > config.max_schema_file_size as u64 {
                return Err(SchemaError::LoadFailed(format!(
                    "schema file too large ({} bytes): {file_name}",
                    opened_metadata.len()
                )));
            }

            let read_limit =
                u64::try_from(config.max_schema_file_size.saturating_add(1)).unwrap_or(u64::MAX);
            let mut content = String::new();
            file.take(read_limit)
                .read_to_string(&mut content)
                .map_err(|err| {
                    SchemaError::LoadFailed(format!(
                        "failed reading schema {}: {err}",
                        entry_path.display()
                    ))
                })?;
            if content.len() > config.max_schema_file_size {
                return Err(SchemaError::LoadFailed(format!(
                    "schema file too large while reading: {file_name}"
                )));
            }

            validator.register_method_schema(method, &content)?;
            debug!(method = %method, file = %file_name, "loaded method schema");
        }

        Ok(validator)
    }

    /// Validate an inbound call envelope, including its method schema if any.
    pub fn validate_call(&self, value: &Value) -> Result<()> {
        validate_value(Shape::Call.as_str(), value, &self.call)?;

        let method = value
            .get("method")
            .and_then(Value::as_str)
            .and_then(|tag| tag.parse::<Method>().ok());
        if let Some(validator) = method.and_then(|method| self.methods.get(&method)) {
            validate_value(Shape::Call.as_str(), value, validator)?;
        }
        Ok(())
    }

    /// Validate an inbound response envelope.
    pub fn validate_response(&self, value: &Value) -> Result<()> {
        validate_value(Shape::Response.as_str(), value, &self.response)
    }

    /// Validate against the schema for `shape`.
    pub fn validate(&self, shape: Shape, value: &Value) -> Result<()> {
        match shape {
            Shape::Call => self.validate_call(value),
            Shape::Response => self.validate_response(value),
        }
    }

    pub fn has_method_schema(&self, method: Method) -> bool {
        self.methods.contains_key(&method)
    }

    /// Methods with a registered schema, in protocol order.
    pub fn methods(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|method| self.methods.contains_key(method))
            .collect()
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }
}

impl fmt::Debug for EnvelopeValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeValidator")
            .field("methods", &self.methods())
            .field("config", &self.config)
            .finish()
    }
}

fn compile(schema: &Value, strict_mode: bool) -> Result<Validator> {
    let mut schema_to_compile = schema.clone();
    if strict_mode {
        apply_strict_mode(&mut schema_to_compile);
    }
    jsonschema::validator_for(&schema_to_compile)
        .map_err(|err| SchemaError::CompileFailed(err.to_string()))
}

fn resolve_method_from_file_name(file_name: &str) -> Option<Method> {
    let lower = file_name.to_ascii_lowercase();
    let stem = lower.strip_suffix(SCHEMA_SUFFIX)?;
    Method::ALL
        .into_iter()
        .find(|method| method.as_str().to_ascii_lowercase() == stem)
}

fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }

            recurse_object_schema_children(map);
        }
        Value::Array(items) => {
            for item in items {
                apply_strict_mode(item);
            }
        }
        _ => {}
    }
}

fn recurse_object_schema_children(map: &mut Map<String, Value>) {
    for key in ["properties", "patternProperties", "$defs", "definitions"] {
        if let Some(Value::Object(obj)) = map.get_mut(key) {
            for value in obj.values_mut() {
                apply_strict_mode(value);
            }
        }
    }

    for key in ["items", "additionalProperties", "not", "if", "then", "else"] {
        if let Some(value) = map.get_mut(key) {
            apply_strict_mode(value);
        }
    }

    for key in ["prefixItems", "allOf", "anyOf", "oneOf"] {
        if let Some(Value::Array(items)) = map.get_mut(key) {
            for item in items {
                apply_strict_mode(item);
            }
        }
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    const OBJECT_KEYWORDS: [&str; 4] = [
        "properties",
        "patternProperties",
        "required",
        "dependentRequired",
    ];

    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Value::String(kind) if kind == "object")),
        _ => OBJECT_KEYWORDS
            .iter()
            .any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
