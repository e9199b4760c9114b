//! Outer framing on a shared connection.
//!
//! Device connections multiplex several message kinds over one socket, each
//! a JSON object with a `type` discriminator. MCP traffic travels as
//! `{"type": "mcp", "payload": {...}}`. Dedicated provider connections carry
//! bare JSON-RPC instead.

use serde_json::{json, Value};

use crate::utils::errors::McpResult;

pub const MCP_FRAME_TYPE: &str = "mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Bare JSON-RPC text.
    #[default]
    Raw,
    /// Wrapped in an `mcp` frame.
    Envelope,
}

impl Framing {
    pub fn encode(&self, payload: &Value) -> McpResult<String> {
        let text = match self {
            Framing::Raw => serde_json::to_string(payload)?,
            Framing::Envelope => serde_json::to_string(&wrap(payload.clone()))?,
        };
        Ok(text)
    }
}

/// Wrap a JSON-RPC payload in an `mcp` frame.
pub fn wrap(payload: Value) -> Value {
    json!({ "type": MCP_FRAME_TYPE, "payload": payload })
}

/// Extract the payload of an inbound `mcp` frame. Other frame types and
/// malformed text yield `None`.
pub fn unwrap(text: &str) -> Option<Value> {
    let mut frame: Value = serde_json::from_str(text).ok()?;
    if frame.get("type").and_then(Value::as_str) != Some(MCP_FRAME_TYPE) {
        return None;
    }
    frame.get_mut("payload").map(Value::take)
}
