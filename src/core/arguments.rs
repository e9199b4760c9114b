//! Tool-call argument coercion.
//!
//! Language models occasionally emit several JSON objects back to back
//! instead of one. Recovery from that is a separate, swappable step
//! ([`ArgumentRecovery`]) so call semantics do not depend on it.

use serde_json::{Map, Value};
use tracing::debug;

use crate::utils::errors::{McpError, McpResult};

/// Arguments as handed over by the function-calling layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    /// Already-structured arguments, used as-is.
    Structured(Map<String, Value>),
    /// Raw model output expected to hold one JSON object.
    Text(String),
    /// Structured but not an object; always rejected.
    Other(Value),
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Structured(Map::new())
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        Self::Structured(map)
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Structured(map),
            Value::String(text) => Self::Text(text),
            Value::Null => Self::Structured(Map::new()),
            other => Self::Other(other),
        }
    }
}

impl From<&str> for ToolArguments {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ToolArguments {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Best-effort repair of argument text that failed to parse as one object.
pub trait ArgumentRecovery: Send + Sync {
    /// Return the recovered object, or `None` when nothing could be salvaged.
    fn recover(&self, raw: &str) -> Option<Map<String, Value>>;
}

/// Disables recovery: any parse failure is a parameter error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecovery;

impl ArgumentRecovery for NoRecovery {
    fn recover(&self, _raw: &str) -> Option<Map<String, Value>> {
        None
    }
}

/// Shallow-merges every top-level `{...}` fragment; later keys win.
///
/// Fragments that do not parse, or parse to something other than an object,
/// are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentMerge;

impl ArgumentRecovery for FragmentMerge {
    fn recover(&self, raw: &str) -> Option<Map<String, Value>> {
        let mut merged = Map::new();
        let mut recovered_any = false;

        for fragment in top_level_objects(raw) {
            match serde_json::from_str::<Value>(fragment) {
                Ok(Value::Object(obj)) => {
                    recovered_any = true;
                    for (key, value) in obj {
                        merged.insert(key, value);
                    }
                }
                Ok(other) => debug!("Dropping non-object argument fragment: {}", other),
                Err(e) => debug!("Dropping unparsable argument fragment {}: {}", fragment, e),
            }
        }

        recovered_any.then_some(merged)
    }
}

/// Slices of `raw` that are balanced, top-level `{...}` spans. Braces inside
/// string literals do not count.
fn top_level_objects(raw: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in raw.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&raw[start..=idx]);
                }
            }
            _ => {}
        }
    }

    spans
}

/// Coerce caller arguments into the object sent on the wire.
pub fn coerce_arguments(
    arguments: ToolArguments,
    recovery: &dyn ArgumentRecovery,
) -> McpResult<Map<String, Value>> {
    match arguments {
        ToolArguments::Structured(map) => Ok(map),
        ToolArguments::Other(value) => Err(McpError::ParameterError(format!(
            "arguments must be a JSON object, got: {}",
            value
        ))),
        ToolArguments::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(Map::new());
            }

            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(McpError::ParameterError(format!(
                    "arguments must be a JSON object, got: {}",
                    other
                ))),
                Err(parse_err) => recovery.recover(trimmed).ok_or_else(|| {
                    McpError::ParameterError(format!(
                        "failed to parse arguments {:?}: {}",
                        text, parse_err
                    ))
                }),
            }
        }
    }
}
