//! Integration tests for message construction and serialization.

use chrono::{TimeZone, Utc};
use chronicle_types::{
    Content, InvalidMessageError, Message, MessageId, Role, TokenUsage, ToolCallId, Transcript,
};

#[test]
fn tool_result_without_call_id_is_rejected() {
    let err = Message::builder("m3", Role::Tool, Content::Text("output".into()))
        .build()
        .expect_err("tool results need a tool_call_id");
    assert_eq!(err, InvalidMessageError::MissingToolCallId { id: MessageId::new("m3") });
}

#[test]
fn user_message_cannot_carry_call_id() {
    let err = Message::builder("m1", Role::User, Content::Text("hi".into()))
        .tool_call_id("call-1")
        .build()
        .expect_err("users do not make tool calls");
    assert!(matches!(err, InvalidMessageError::UnexpectedToolCallId { role: Role::User, .. }));
}

#[test]
fn tool_call_content_requires_linkage() {
    let content = Content::ToolCall { name: "search".into(), arguments: serde_json::json!({}) };
    let err = Message::builder("m2", Role::Assistant, content)
        .build()
        .expect_err("a tool call without an id cannot be paired");
    assert!(matches!(err, InvalidMessageError::ContentRoleMismatch { content: "tool_call", .. }));
}

#[test]
fn compaction_content_is_system_only() {
    let err = Message::builder("m1", Role::User, Content::Compaction("summary".into()))
        .build()
        .expect_err("summaries are system messages");
    assert!(matches!(err, InvalidMessageError::ContentRoleMismatch { role: Role::User, .. }));
}

#[test]
fn new_accepts_well_formed_tool_result() {
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let msg = Message::new(
        "m3",
        Role::Tool,
        Content::ToolResult { output: "ok".into(), is_error: false },
        Some(ToolCallId::new("call-1")),
        at,
    )
    .expect("valid tool result");
    assert!(msg.is_tool_result());
    assert_eq!(msg.timestamp(), at);
}

#[test]
fn serde_round_trip_keeps_identity_and_linkage() {
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let msg = Message::tool_call("m2", "call-1", "search", serde_json::json!({"q": "rust"}))
        .at(at)
        .with_usage(TokenUsage { input_tokens: 10, output_tokens: 5 });

    let json = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();

    assert_eq!(back.id(), msg.id());
    assert_eq!(back.tool_call_id(), msg.tool_call_id());
    assert_eq!(back.timestamp(), at);
    assert_eq!(back.usage().map(|u| u.total()), Some(15));
    assert_eq!(back.content(), msg.content());
}

#[test]
fn deserializing_an_unlinked_tool_result_fails() {
    let json = r#"{
        "id": "m3",
        "role": "tool",
        "content": {"tool_result": {"output": "x", "is_error": false}},
        "timestamp": "2025-01-01T12:00:00Z"
    }"#;
    let err = serde_json::from_str::<Message>(json).expect_err("missing tool_call_id");
    assert!(err.to_string().contains("require a tool_call_id"));
}

#[test]
fn transcript_shares_messages_on_clone() {
    let transcript = Transcript::new(vec![Message::user("m1", "hi"), Message::assistant("m2", "hello")]);
    let copy = transcript.clone();
    assert!(copy.same_messages(&transcript));
    assert_eq!(copy.position(&MessageId::new("m2")), Some(1));
    assert_eq!(copy.ids(), vec![&MessageId::new("m1"), &MessageId::new("m2")]);
}
