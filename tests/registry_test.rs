use device_mcp::core::registry::{sanitize_tool_name, InputSchema, Tool, ToolRegistry};
use serde_json::json;

#[test]
fn test_one_descriptor_per_sanitized_name() {
    let mut registry = ToolRegistry::new();
    registry.add_tool(Tool::new("light.on", "first", InputSchema::default()));
    registry.add_tool(Tool::new("light_on", "second", InputSchema::default()));
    registry.add_tool(Tool::new("light off", "third", InputSchema::default()));

    let tools = registry.get_available_tools();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name(), "light_on");
    assert_eq!(tools[0].function.description, "second");
    assert_eq!(registry.original_name("light_on"), Some("light_on"));
    assert_eq!(tools[1].name(), "light_off");
}

#[test]
fn test_cache_is_rebuilt_after_add() {
    let mut registry = ToolRegistry::new();
    registry.add_tool(Tool::new("a", "", InputSchema::default()));
    assert_eq!(registry.get_available_tools().len(), 1);

    registry.add_tool(Tool::new("b", "", InputSchema::default()));
    assert_eq!(registry.get_available_tools().len(), 2);
    assert!(registry.has_tool("b"));
}

#[test]
fn test_sanitized_names_match_charset() {
    for name in ["self.camera.take_photo", "a b/c", "", "ünïcode", "--ok--"] {
        let sanitized = sanitize_tool_name(name);
        assert!(sanitized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        assert_eq!(sanitize_tool_name(&sanitized), sanitized);
    }
}

#[test]
fn test_schema_normalization_defaults() {
    let schema = InputSchema::normalize(Some(&json!({"required": ["q", null, 1, "limit"]})));
    assert_eq!(schema.schema_type, "object");
    assert!(schema.properties.is_empty());
    assert_eq!(schema.required, vec!["q".to_string(), "limit".to_string()]);

    let serialized = serde_json::to_value(&schema).unwrap();
    assert_eq!(serialized["type"], "object");
}
