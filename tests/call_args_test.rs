//! Tests for tool argument coercion and recovery

use device_mcp::core::arguments::{coerce_arguments, FragmentMerge, NoRecovery, ToolArguments};
use device_mcp::McpError;
use serde_json::json;

#[test]
fn test_concatenated_fragments_are_merged() {
    let args = coerce_arguments(r#"{"a":1}{"b":2}"#.into(), &FragmentMerge).unwrap();
    assert_eq!(serde_json::Value::Object(args), json!({"a": 1, "b": 2}));
}

#[test]
fn test_later_fragment_wins() {
    let args = coerce_arguments(r#"{"a":1} junk {"a":2,"c":"}{"}"#.into(), &FragmentMerge).unwrap();
    assert_eq!(args["a"], 2);
    assert_eq!(args["c"], "}{");
}

#[test]
fn test_empty_text_is_empty_object() {
    assert!(coerce_arguments("".into(), &FragmentMerge).unwrap().is_empty());
    assert!(coerce_arguments("   ".into(), &NoRecovery).unwrap().is_empty());
}

#[test]
fn test_garbage_is_parameter_error() {
    let result = coerce_arguments("not json".into(), &FragmentMerge);
    assert!(matches!(result, Err(McpError::ParameterError(_))));
}

#[test]
fn test_non_object_json_is_rejected() {
    let result = coerce_arguments("[1,2]".into(), &FragmentMerge);
    assert!(matches!(result, Err(McpError::ParameterError(_))));

    let result = coerce_arguments(ToolArguments::Other(json!(3)), &FragmentMerge);
    assert!(matches!(result, Err(McpError::ParameterError(_))));
}

#[test]
fn test_structured_arguments_pass_through() {
    let args = coerce_arguments(json!({"city": "Shenzhen"}).into(), &NoRecovery).unwrap();
    assert_eq!(args["city"], "Shenzhen");

    // JSON null from an upstream model means "no arguments".
    assert!(coerce_arguments(json!(null).into(), &NoRecovery).unwrap().is_empty());
}
