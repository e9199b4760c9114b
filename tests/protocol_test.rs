use device_mcp::core::protocol::*;
use device_mcp::McpError;
use serde_json::{json, Map};

#[test]
fn test_list_tools_reuses_reserved_id() {
    let first = list_tools_request(None).to_value().unwrap();
    let next = list_tools_request(Some("abc")).to_value().unwrap();

    assert_eq!(first["id"], TOOLS_LIST_ID);
    assert_eq!(next["id"], TOOLS_LIST_ID);
    assert!(first.get("params").is_none());
    assert_eq!(next["params"]["cursor"], "abc");
}

#[test]
fn test_call_tool_request_shape() {
    let mut arguments = Map::new();
    arguments.insert("volume".to_string(), json!(40));

    let value = call_tool_request(7, "self.audio_speaker.set_volume", arguments)
        .to_value()
        .unwrap();

    assert_eq!(value["jsonrpc"], "2.0");
    assert_eq!(value["id"], 7);
    assert_eq!(value["method"], "tools/call");
    assert_eq!(value["params"]["name"], "self.audio_speaker.set_volume");
    assert_eq!(value["params"]["arguments"]["volume"], 40);
}

#[test]
fn test_is_notification() {
    let notification = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: None,
        method: "notifications/initialized".to_string(),
        params: None,
    };
    assert!(notification.is_notification());
    assert!(!list_tools_request(None).is_notification());
}

#[test]
fn test_classify_prefers_result_over_error_and_method() {
    let message = InboundMessage::classify(&json!({
        "id": 3,
        "result": {},
        "error": {"message": "x"},
        "method": "m"
    }))
    .unwrap();
    assert!(matches!(message, InboundMessage::Result { id: Some(3), .. }));

    let message = InboundMessage::classify(&json!({"id": "4", "error": "boom", "method": "m"})).unwrap();
    match message {
        InboundMessage::Error { id, error } => {
            assert_eq!(id, Some(4));
            assert_eq!(error.message, "boom");
        }
        other => panic!("unexpected: {:?}", other),
    }

    let message = InboundMessage::classify(&json!({"method": "notifications/tools/list_changed"})).unwrap();
    assert!(matches!(message, InboundMessage::Method { id: None, .. }));

    assert!(InboundMessage::classify(&json!({"id": 1})).is_none());
    assert!(InboundMessage::classify(&json!([1, 2])).is_none());
}

#[test]
fn test_unwrap_call_result() {
    assert_eq!(
        unwrap_call_result(&json!({"content": [{"text": "ok"}]})).unwrap(),
        "ok"
    );

    // Text is opaque: JSON inside it is not decoded.
    assert_eq!(
        unwrap_call_result(&json!({"content": [{"type": "text", "text": "{\"a\":1}"}]})).unwrap(),
        "{\"a\":1}"
    );

    match unwrap_call_result(&json!({"isError": true, "error": "bad"})) {
        Err(McpError::RemoteError(message)) => assert!(message.contains("bad")),
        other => panic!("unexpected: {:?}", other),
    }

    assert_eq!(unwrap_call_result(&json!({"foo": 1})).unwrap(), r#"{"foo":1}"#);
}
