use arbor_types::AgentEvent;
use serde_json::json;

#[test]
fn test_text_chunk_serialization() {
    let event = AgentEvent::TextChunk {
        content: "Hello".to_string(),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value, json!({ "type": "text_chunk", "content": "Hello" }));
}

#[test]
fn test_argument_chunk_omits_unknowns() {
    let event = AgentEvent::ToolArgumentChunk {
        index: 0,
        call_id: None,
        path: "query".to_string(),
        chunk: "rust".to_string(),
        declared_type: None,
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(
        value,
        json!({ "type": "tool_argument_chunk", "index": 0, "path": "query", "chunk": "rust" })
    );
}

#[test]
fn test_error_roundtrip() {
    let event = AgentEvent::error("model unavailable");
    let text = serde_json::to_string(&event).unwrap();
    let parsed: AgentEvent = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, event);

    match parsed {
        AgentEvent::Error { message, call_id } => {
            assert_eq!(message, "model unavailable");
            assert!(call_id.is_none());
        }
        _ => panic!("Expected Error event"),
    }
}
