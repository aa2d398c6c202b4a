use builder_api::ChatStreamEvent;

#[test]
fn stream_event_variant_names_stable() {
    let token = serde_json::to_value(ChatStreamEvent::Token {
        content: "hi".to_string(),
    })
    .expect("serialize token");
    assert_eq!(token["type"], "token");
    assert_eq!(token["content"], "hi");

    let done = serde_json::to_value(ChatStreamEvent::Done).expect("serialize done");
    assert_eq!(done, serde_json::json!({"type": "done"}));
}

#[test]
fn only_done_and_error_are_terminal() {
    assert!(!ChatStreamEvent::Token {
        content: String::new(),
    }
    .is_terminal());
    assert!(ChatStreamEvent::Done.is_terminal());
    assert!(ChatStreamEvent::Error { error: None }.is_terminal());
}
