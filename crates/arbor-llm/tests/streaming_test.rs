use arbor_llm::{ModelEvent, ToolCall};

#[test]
fn test_model_event_text() {
    let event = ModelEvent::text("Hello");

    match event {
        ModelEvent::Text { content } => assert_eq!(content, "Hello"),
        _ => panic!("Expected Text variant"),
    }
}

#[test]
fn test_model_event_tool_arguments_serialization() {
    let event = ModelEvent::ToolArguments {
        index: 0,
        id: Some("call_123".to_string()),
        name: None,
        chunk: r#"{"city""#.to_string(),
    };

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"tool_arguments\""));
    assert!(json.contains("call_123"));
    assert!(!json.contains("\"name\""));
}

#[test]
fn test_model_event_completed_is_terminal() {
    let event = ModelEvent::completed(
        "Checking",
        vec![ToolCall::new("call_1", "weather__forecast", r#"{"city":"NYC"}"#)],
    );
    assert!(event.is_terminal());
    assert!(!ModelEvent::text("x").is_terminal());

    let json = serde_json::to_string(&event).unwrap();
    let back: ModelEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
