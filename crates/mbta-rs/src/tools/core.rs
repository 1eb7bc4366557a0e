//! Tool registry and dispatcher.
//!
//! A [`ToolDescriptor`] pairs a published [`ToolDef`] (name, description,
//! JSON Schema) with a compiled validator and a type-erased async handler.
//! Descriptors are collected into a [`ToolRegistry`], which is built once at
//! startup and only read afterwards.
//!
//! [`ToolRegistry::dispatch`] is a pure routing and validation layer: it
//! looks the tool up, validates the arguments against the schema, calls the
//! handler and classifies failures into a [`ToolError`]. Caching and retry
//! belong to the client the handlers call into.

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Bytes of the argument JSON shown in the per-call log line.
const ARGS_PREVIEW_CHARS: usize = 120;

// ── ToolDef ────────────────────────────────────────────────────────

/// Tool definition as published to tool-calling clients.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// A classified dispatch failure. Serializes to a JSON body tagged with
/// `error` (the snake_case kind).
#[derive(Error, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ToolError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    /// Arguments failed validation; `fields` names every offending argument.
    #[error("invalid arguments ({}): {message}", .fields.join(", "))]
    InvalidArguments { fields: Vec<String>, message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("upstream rejected the request (HTTP {status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// Transient upstream failure that survived every retry.
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Upstream answered with a shape the decoder does not accept.
    #[error("could not decode upstream response: {message}")]
    DecodeError { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ToolError {
    /// The snake_case kind, matching the serialized `error` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool { .. } => "unknown_tool",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::NotFound { .. } => "not_found",
            ToolError::UpstreamRejected { .. } => "upstream_rejected",
            ToolError::ServiceUnavailable { .. } => "service_unavailable",
            ToolError::DecodeError { .. } => "decode_error",
            ToolError::Internal { .. } => "internal",
        }
    }

    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            fields: vec![field.into()],
            message: message.into(),
        }
    }
}

impl From<ApiError> for ToolError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::InvalidArgument { field, reason } => {
                let message = format!("{field}: {reason}");
                ToolError::invalid(field, message)
            }
            ApiError::NotFound { .. } => ToolError::NotFound {
                message: e.to_string(),
            },
            ApiError::Rejected { status, detail } => ToolError::UpstreamRejected {
                status,
                message: detail,
            },
            ApiError::RateLimited { .. }
            | ApiError::Server { .. }
            | ApiError::Timeout(_)
            | ApiError::Connection(_)
            | ApiError::Exhausted { .. } => ToolError::ServiceUnavailable {
                message: e.to_string(),
            },
            ApiError::Decode(message) => ToolError::DecodeError { message },
            ApiError::Configuration(_) | ApiError::Internal(_) => ToolError::Internal {
                message: e.to_string(),
            },
        }
    }
}

// ── Response shape ─────────────────────────────────────────────────

/// One block of tool output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// External tool-call response: content blocks plus an error flag.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResponse {
    /// Pretty-printed JSON result.
    pub fn success(value: &Value) -> Self {
        Self::text(pretty(value), false)
    }

    /// JSON error body (`{"error": <kind>, ...}`).
    pub fn failure(error: &ToolError) -> Self {
        let body = serde_json::to_value(error).unwrap_or_else(|_| {
            serde_json::json!({"error": error.kind(), "message": error.to_string()})
        });
        Self::text(pretty(&body), true)
    }

    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ContentBlock::Text { text }],
            is_error,
        }
    }

    /// Concatenated text of every block.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|ContentBlock::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ── ToolDescriptor ─────────────────────────────────────────────────

/// Boxed future produced by a tool handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;

/// Type-erased async handler for [`ToolDescriptor`].
type ErasedToolHandler = Box<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// A registered tool: definition, compiled schema validator, handler.
pub struct ToolDescriptor {
    def: ToolDef,
    validator: Option<jsonschema::Validator>,
    handler: ErasedToolHandler,
}

impl ToolDescriptor {
    /// Bind `handler` to `def`.
    ///
    /// The handler receives arguments of type `A`, deserialized after schema
    /// validation, and its success value is serialized to JSON. Failures
    /// are classified through `From<ApiError> for ToolError`.
    pub fn new<A, R, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        let erased = move |raw: Value| -> ToolFuture {
            let args: A = match serde_json::from_value(raw) {
                Ok(a) => a,
                Err(e) => {
                    let error = ToolError::InvalidArguments {
                        fields: Vec::new(),
                        message: e.to_string(),
                    };
                    return Box::pin(async move { Err(error) });
                }
            };
            let call = handler(args);
            Box::pin(async move {
                let result = call.await?;
                serde_json::to_value(result).map_err(|e| ToolError::Internal {
                    message: format!("could not serialize result: {e}"),
                })
            })
        };

        // A schema the validator cannot compile is skipped; deserialization
        // still rejects malformed arguments.
        let validator = match jsonschema::validator_for(&def.input_schema) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Tool {}: schema does not compile, validation disabled: {e}", def.name);
                None
            }
        };

        Self {
            def,
            validator,
            handler: Box::new(erased),
        }
    }

    pub fn definition(&self) -> &ToolDef {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Validate `arguments` against the schema, naming every offending field.
    pub fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let mut fields = Vec::new();
        let mut messages = Vec::new();
        for error in validator.iter_errors(arguments) {
            let path = error.instance_path().to_string();
            match path.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty()) {
                Some(field) => {
                    fields.push(field.to_string());
                    messages.push(format!("{field}: {error}"));
                }
                None => {
                    fields.extend(missing_required(&self.def.input_schema, arguments));
                    messages.push(error.to_string());
                }
            }
        }
        if messages.is_empty() {
            return Ok(());
        }
        fields.sort();
        fields.dedup();
        Err(ToolError::InvalidArguments {
            fields,
            message: messages.join("; "),
        })
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.def.name)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Names listed in the schema's top-level `required` array that `arguments`
/// does not carry.
fn missing_required(schema: &Value, arguments: &Value) -> Vec<String> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Vec::new();
    };
    required
        .iter()
        .filter_map(Value::as_str)
        .filter(|name| arguments.get(name).is_none())
        .map(str::to_string)
        .collect()
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// Immutable name → descriptor mapping.
///
/// Built with [`with`](ToolRegistry::with) at startup and shared read-only
/// afterwards, so dispatch needs no synchronization.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool (builder pattern). Replaces any tool with the same name.
    pub fn with(mut self, tool: ToolDescriptor) -> Self {
        self.tools.insert(tool.def.name.clone(), tool);
        self
    }

    /// Every definition, sorted by name.
    pub fn definitions(&self) -> Vec<&ToolDef> {
        let mut defs: Vec<&ToolDef> = self.tools.values().map(|t| &t.def).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Route one tool call. `null` arguments are treated as `{}`.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        let Some(tool) = self.tools.get(name) else {
            warn!("[tool] unknown tool '{name}'");
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            });
        };
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments.clone()
        };
        tool.validate(&arguments)?;

        log_tool_call(name, &arguments);
        let start = Instant::now();
        let result = (tool.handler)(arguments).await;
        match &result {
            Ok(_) => debug!(
                "Tool {name} completed in {:.0}ms",
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Err(e) => info!(
                "Tool {name} failed after {:.0}ms: {e}",
                start.elapsed().as_secs_f64() * 1000.0
            ),
        }
        result
    }

    /// Dispatch and wrap the outcome in the external response shape. Never
    /// fails; errors become `isError: true` responses.
    pub async fn call(&self, name: &str, arguments: &Value) -> ToolResponse {
        match self.dispatch(name, arguments).await {
            Ok(value) => ToolResponse::success(&value),
            Err(e) => ToolResponse::failure(&e),
        }
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
fn log_tool_call(name: &str, arguments: &Value) {
    let raw = arguments.to_string();
    let preview: String = raw.chars().take(ARGS_PREVIEW_CHARS).collect();
    info!(
        "[tool] {}({preview}{})",
        name,
        if raw.chars().count() > ARGS_PREVIEW_CHARS { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {raw}");
}
