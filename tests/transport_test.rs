//! Transport layer tests

use device_mcp::config::ProviderConfig;
use device_mcp::transport::{self, frame, Framing};
use device_mcp::McpError;
use serde_json::json;

#[test]
fn test_frame_wrap_and_unwrap() {
    let payload = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
    let text = Framing::Envelope.encode(&payload).unwrap();

    let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame["type"], "mcp");
    assert_eq!(frame::unwrap(&text), Some(payload.clone()));

    let raw = Framing::Raw.encode(&payload).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&raw).unwrap(), payload);
}

#[test]
fn test_unwrap_ignores_other_traffic() {
    assert_eq!(frame::unwrap(r#"{"type":"listen","state":"start"}"#), None);
    assert_eq!(frame::unwrap("{broken"), None);
    assert_eq!(frame::unwrap(r#"{"type":"mcp"}"#), None);
}

#[tokio::test]
async fn test_connect_requires_endpoint() {
    let result = transport::connect("blank", &ProviderConfig::default()).await;
    assert!(matches!(result, Err(McpError::ConfigError(_))));
}

#[tokio::test]
async fn test_connect_refused_websocket() {
    // Port 9 (discard) is closed on test machines.
    let config = ProviderConfig::websocket("ws://127.0.0.1:9/mcp");
    let result = transport::connect("ws", &config).await;
    assert!(matches!(result, Err(McpError::TransportError(_))));
}
