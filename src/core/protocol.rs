//! MCP wire envelopes and the codec that builds and classifies them.
//!
//! Outbound requests are plain JSON-RPC 2.0 objects. Inbound payloads are
//! classified once into [`InboundMessage`] so the dispatcher matches on a tag
//! instead of probing for keys.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::utils::errors::{McpError, McpResult};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Reserved id of the `initialize` request.
pub const INITIALIZE_ID: u64 = 1;
/// Reserved id of every `tools/list` request, continuation pages included.
pub const TOOLS_LIST_ID: u64 = 2;
/// First id handed out to `tools/call` requests.
pub const FIRST_CALL_ID: u64 = 3;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn with_id(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn to_value(&self) -> McpResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// JSON-RPC 2.0 error object. Peers are sloppy about it, so every field has a
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default = "default_error_message")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn default_error_message() -> String {
    "unknown error".to_string()
}

impl JsonRpcError {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => {
                serde_json::from_value(value.clone()).unwrap_or_else(|_| Self {
                    code: 0,
                    message: value
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(default_error_message),
                    data: None,
                })
            }
            Value::String(s) => Self {
                code: 0,
                message: s.clone(),
                data: None,
            },
            other => Self {
                code: 0,
                message: other.to_string(),
                data: None,
            },
        }
    }
}

/// Name and version of either side of the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    /// Identity this crate advertises in `initialize`.
    pub fn client() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Peer identity reported in the `initialize` result. Both fields optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Vision / tool-assist capability: where the device may post images and the
/// bearer token it must present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionCapability {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    pub list_changed: bool,
}

/// Client capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    pub roots: RootsCapability,
    pub sampling: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<VisionCapability>,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            roots: RootsCapability { list_changed: true },
            sampling: Map::new(),
            vision: None,
        }
    }
}

/// MCP Initialize request params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

/// Build the `initialize` request (id 1).
pub fn initialize_request(vision: Option<VisionCapability>) -> McpResult<JsonRpcRequest> {
    let params = InitializeParams {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ClientCapabilities {
            vision,
            ..Default::default()
        },
        client_info: Implementation::client(),
    };

    Ok(JsonRpcRequest::with_id(
        INITIALIZE_ID,
        METHOD_INITIALIZE,
        Some(serde_json::to_value(params)?),
    ))
}

/// Build a `tools/list` request (id 2). Continuation pages carry the cursor.
pub fn list_tools_request(cursor: Option<&str>) -> JsonRpcRequest {
    let params = cursor.map(|c| json!({ "cursor": c }));
    JsonRpcRequest::with_id(TOOLS_LIST_ID, METHOD_TOOLS_LIST, params)
}

/// Build a `tools/call` request addressed by the tool's wire name.
pub fn call_tool_request(id: u64, original_name: &str, arguments: Map<String, Value>) -> JsonRpcRequest {
    JsonRpcRequest::with_id(
        id,
        METHOD_TOOLS_CALL,
        Some(json!({ "name": original_name, "arguments": arguments })),
    )
}

/// A decoded inbound payload. Exactly one case applies.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Result { id: Option<u64>, result: Value },
    Error { id: Option<u64>, error: JsonRpcError },
    Method { id: Option<u64>, method: String, params: Option<Value> },
}

impl InboundMessage {
    /// Classify a payload. `result` wins over `error`, which wins over
    /// `method`. Returns `None` for anything that is not a JSON object or
    /// carries none of the three keys.
    pub fn classify(payload: &Value) -> Option<Self> {
        let obj = payload.as_object()?;
        let id = obj.get("id").and_then(parse_id);

        if let Some(result) = obj.get("result") {
            return Some(Self::Result {
                id,
                result: result.clone(),
            });
        }

        if let Some(error) = obj.get("error") {
            return Some(Self::Error {
                id,
                error: JsonRpcError::from_value(error),
            });
        }

        if let Some(method) = obj.get("method").and_then(Value::as_str) {
            return Some(Self::Method {
                id,
                method: method.to_string(),
                params: obj.get("params").cloned(),
            });
        }

        None
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Result { id, .. } | Self::Error { id, .. } | Self::Method { id, .. } => *id,
        }
    }
}

/// Ids arrive as numbers, occasionally as numeric strings.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Turn a raw `tools/call` result into the text handed back to the caller.
///
/// `isError: true` becomes [`McpError::RemoteError`]; otherwise the first
/// content item's `text` is returned verbatim; anything else is stringified.
pub fn unwrap_call_result(raw: &Value) -> McpResult<String> {
    if let Value::Object(obj) = raw {
        if obj.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(McpError::RemoteError(remote_error_message(obj)));
        }

        if let Some(text) = first_content_text(obj) {
            return Ok(text.to_string());
        }
    }

    Ok(match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn first_content_text(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("content")?
        .as_array()?
        .first()?
        .as_object()?
        .get("text")?
        .as_str()
}

fn remote_error_message(obj: &Map<String, Value>) -> String {
    match obj.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(e)) => e
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(e.clone()).to_string()),
        Some(other) if !other.is_null() => other.to_string(),
        _ => first_content_text(obj)
            .map(str::to_string)
            .unwrap_or_else(|| "tool call returned an error without details".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_request_shape() {
        let vision = VisionCapability {
            url: "http://10.0.0.2:8003/mcp/vision/explain".to_string(),
            token: "tok".to_string(),
        };
        let request = initialize_request(Some(vision)).unwrap();
        let value = request.to_value().unwrap();

        assert_eq!(value["id"], 1);
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "initialize");
        assert_eq!(value["params"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["params"]["capabilities"]["roots"]["listChanged"], true);
        assert_eq!(value["params"]["capabilities"]["vision"]["token"], "tok");
        assert_eq!(value["params"]["clientInfo"]["name"], env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn test_initialize_without_vision_omits_capability() {
        let value = initialize_request(None).unwrap().to_value().unwrap();
        assert!(value["params"]["capabilities"].get("vision").is_none());
    }

    #[test]
    fn test_list_tools_reuses_reserved_id() {
        let first = list_tools_request(None).to_value().unwrap();
        assert_eq!(first["id"], 2);
        assert!(first.get("params").is_none());

        let next = list_tools_request(Some("abc")).to_value().unwrap();
        assert_eq!(next["id"], 2);
        assert_eq!(next["params"]["cursor"], "abc");
    }

    #[test]
    fn test_classify_prefers_result() {
        let msg = InboundMessage::classify(&json!({"id": 5, "result": {}, "error": {"message": "x"}}));
        assert!(matches!(msg, Some(InboundMessage::Result { id: Some(5), .. })));
    }

    #[test]
    fn test_classify_error_and_method() {
        let err = InboundMessage::classify(&json!({"id": "7", "error": {"code": -32601, "message": "nope"}}));
        match err {
            Some(InboundMessage::Error { id, error }) => {
                assert_eq!(id, Some(7));
                assert_eq!(error.code, -32601);
                assert_eq!(error.message, "nope");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let method = InboundMessage::classify(&json!({"method": "notifications/tools/list_changed"}));
        assert!(matches!(method, Some(InboundMessage::Method { id: None, .. })));

        assert!(InboundMessage::classify(&json!({"id": 1})).is_none());
        assert!(InboundMessage::classify(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_error_without_message_gets_default() {
        let msg = InboundMessage::classify(&json!({"id": 3, "error": {}}));
        match msg {
            Some(InboundMessage::Error { error, .. }) => assert_eq!(error.message, "unknown error"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unwrap_call_result() {
        assert_eq!(
            unwrap_call_result(&json!({"content": [{"type": "text", "text": "ok"}]})).unwrap(),
            "ok"
        );

        match unwrap_call_result(&json!({"isError": true, "error": "bad"})) {
            Err(McpError::RemoteError(msg)) => assert!(msg.contains("bad")),
            other => panic!("unexpected: {:?}", other),
        }

        assert_eq!(unwrap_call_result(&json!({"foo": 1})).unwrap(), r#"{"foo":1}"#);
    }

    #[test]
    fn test_unwrap_text_is_not_decoded() {
        let raw = json!({"content": [{"text": "{\"temp\": 21}"}]});
        assert_eq!(unwrap_call_result(&raw).unwrap(), "{\"temp\": 21}");
    }

    #[test]
    fn test_is_error_falls_back_to_content_text() {
        let raw = json!({"isError": true, "content": [{"text": "device busy"}]});
        match unwrap_call_result(&raw) {
            Err(McpError::RemoteError(msg)) => assert_eq!(msg, "device busy"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
