//! Per-endpoint tool registry
//!
//! Tools are keyed by their sanitized name, the form the function-calling
//! layer accepts. The wire name is kept alongside so calls can be translated
//! back. The descriptor list handed to the model is derived lazily and
//! dropped whenever the registry changes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Normalized JSON schema of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

impl InputSchema {
    /// Fill in defaults and keep only string entries of `required`.
    pub fn normalize(raw: Option<&Value>) -> Self {
        let Some(schema) = raw.and_then(Value::as_object) else {
            return Self::default();
        };

        Self {
            schema_type: schema
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("object")
                .to_string(),
            properties: schema
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            required: schema
                .get("required")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// A callable action advertised by the remote endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub sanitized_name: String,
    pub original_name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl Tool {
    pub fn new(original_name: impl Into<String>, description: impl Into<String>, input_schema: InputSchema) -> Self {
        let original_name = original_name.into();
        Self {
            sanitized_name: sanitize_tool_name(&original_name),
            original_name,
            description: description.into(),
            input_schema,
        }
    }

    /// Parse one item of a `tools/list` page. Non-objects and nameless
    /// entries yield `None`.
    pub fn from_wire(item: &Value) -> Option<Self> {
        let obj = item.as_object()?;
        let name = obj.get("name").and_then(Value::as_str).unwrap_or_default();
        if name.is_empty() {
            return None;
        }

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Some(Self::new(
            name,
            description,
            InputSchema::normalize(obj.get("inputSchema")),
        ))
    }

    pub fn descriptor(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(&self.sanitized_name, &self.description, self.input_schema.clone())
    }
}

/// Tool as exposed to the function-calling layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: InputSchema,
}

impl FunctionDescriptor {
    pub fn new(name: &str, description: &str, parameters: InputSchema) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Tools of one endpoint, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
    order: Vec<String>,
    cached: OnceLock<Arc<Vec<FunctionDescriptor>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_tool(&self, sanitized_name: &str) -> bool {
        self.tools.contains_key(sanitized_name)
    }

    pub fn get(&self, sanitized_name: &str) -> Option<&Tool> {
        self.tools.get(sanitized_name)
    }

    /// Wire name for a sanitized name.
    pub fn original_name(&self, sanitized_name: &str) -> Option<&str> {
        self.tools
            .get(sanitized_name)
            .map(|tool| tool.original_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Register or replace a tool. A later tool whose name sanitizes to an
    /// existing key replaces the earlier one in place.
    pub fn add_tool(&mut self, tool: Tool) {
        let key = tool.sanitized_name.clone();

        match self.tools.get(&key) {
            Some(existing) if existing.original_name != tool.original_name => {
                warn!(
                    "Tool '{}' collides with '{}' after sanitization as '{}', keeping the later one",
                    tool.original_name, existing.original_name, key
                );
            }
            Some(_) => debug!("Replacing tool '{}'", key),
            None => self.order.push(key.clone()),
        }

        self.tools.insert(key, tool);
        self.invalidate();
    }

    /// Rewrite descriptions so they mention tools by their sanitized names.
    pub fn rewrite_descriptions(&mut self) {
        let mut renames: Vec<(String, String)> = self
            .tools
            .values()
            .filter(|tool| tool.original_name != tool.sanitized_name)
            .map(|tool| (tool.original_name.clone(), tool.sanitized_name.clone()))
            .collect();

        if renames.is_empty() {
            return;
        }

        // Longest first so "light.on" is rewritten before "light".
        renames.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        for tool in self.tools.values_mut() {
            let mut description = std::mem::take(&mut tool.description);
            for (original, sanitized) in &renames {
                if description.contains(original.as_str()) {
                    description = description.replace(original.as_str(), sanitized);
                }
            }
            tool.description = description;
        }

        self.invalidate();
    }

    /// Descriptor list for the function-calling layer, built on first read
    /// after a change.
    pub fn get_available_tools(&self) -> Arc<Vec<FunctionDescriptor>> {
        self.cached
            .get_or_init(|| Arc::new(self.tools().map(Tool::descriptor).collect()))
            .clone()
    }

    fn invalidate(&mut self) {
        self.cached.take();
    }
}
