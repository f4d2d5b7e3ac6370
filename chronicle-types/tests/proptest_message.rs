//! Property-based tests: message construction and serde invariants.

use chrono::{DateTime, TimeZone, Utc};
use chronicle_types::*;
use proptest::prelude::*;
use serde_json::{Value, json};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

fn arb_usage() -> impl Strategy<Value = Option<TokenUsage>> {
    proptest::option::of((0usize..100_000, 0usize..10_000).prop_map(
        |(input_tokens, output_tokens)| TokenUsage { input_tokens, output_tokens },
    ))
}

fn arb_message() -> impl Strategy<Value = Message> {
    let body = prop_oneof![
        ("[a-z0-9]{1,12}", any::<String>()).prop_map(|(id, text)| Message::user(id, text)),
        ("[a-z0-9]{1,12}", any::<String>()).prop_map(|(id, text)| Message::assistant(id, text)),
        ("[a-z0-9]{1,12}", any::<String>()).prop_map(|(id, text)| Message::system(id, text)),
        ("[a-z0-9]{1,12}", "[a-z0-9-]{1,12}", "[a-z_]{1,16}", any::<String>()).prop_map(
            |(id, call, name, query)| Message::tool_call(id, call, name, json!({"q": query}))
        ),
        ("[a-z0-9]{1,12}", "[a-z0-9-]{1,12}", any::<String>())
            .prop_map(|(id, call, output)| Message::tool_result(id, call, output)),
    ];
    (body, 0i64..1_000_000, arb_usage(), proptest::option::of(0usize..50_000)).prop_map(
        |(message, seconds, usage, estimate)| {
            let message = message.at(at(seconds));
            let message = match usage {
                Some(usage) => message.with_usage(usage),
                None => message,
            };
            match estimate {
                Some(tokens) => message.with_token_estimate(tokens),
                None => message,
            }
        },
    )
}

proptest! {
    #[test]
    fn serde_keeps_every_field(msg in arb_message()) {
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.id(), msg.id());
        prop_assert_eq!(back.role(), msg.role());
        prop_assert_eq!(back.content(), msg.content());
        prop_assert_eq!(back.tool_call_id(), msg.tool_call_id());
        prop_assert_eq!(back.timestamp(), msg.timestamp());
        prop_assert_eq!(back.usage(), msg.usage());
        prop_assert_eq!(back.token_estimate(), msg.token_estimate());
    }

    #[test]
    fn unlinked_tool_messages_never_deserialize(msg in arb_message()) {
        let mut value = serde_json::to_value(&msg).unwrap();
        let Value::Object(fields) = &mut value else {
            panic!("messages serialize as objects");
        };
        let had_link = fields.remove("tool_call_id").is_some();
        let parsed = serde_json::from_value::<Message>(value);
        // Only tool-call and tool-result messages carry a link; without it
        // they must be rejected, and everything else is unaffected.
        prop_assert_eq!(had_link, msg.tool_call_id().is_some());
        prop_assert_eq!(parsed.is_err(), had_link);
    }

    #[test]
    fn with_content_keeps_identity(msg in arb_message(), text in any::<String>()) {
        let content = match msg.content() {
            Content::Text(_) => Content::Text(text),
            Content::ToolCall { name, .. } => {
                Content::ToolCall { name: name.clone(), arguments: Value::String(text) }
            }
            Content::ToolResult { is_error, .. } => {
                Content::ToolResult { output: Value::String(text), is_error: *is_error }
            }
            other => other.clone(),
        };
        let swapped = msg.with_content(content).unwrap();
        prop_assert_eq!(&swapped, &msg);
        prop_assert_eq!(swapped.role(), msg.role());
        prop_assert_eq!(swapped.tool_call_id(), msg.tool_call_id());
        prop_assert_eq!(swapped.timestamp(), msg.timestamp());
        prop_assert_eq!(swapped.usage(), msg.usage());
        prop_assert_eq!(swapped.token_estimate(), msg.token_estimate());
    }

    #[test]
    fn heuristic_never_shrinks_as_text_grows(a in any::<String>(), b in any::<String>()) {
        let counter = TokenCounter::new();
        let short = Message::user("m1", a.clone());
        let long = Message::user("m1", a + &b);
        prop_assert!(counter.estimate_message(&short) >= TokenCounter::MESSAGE_OVERHEAD);
        prop_assert!(counter.estimate_message(&long) >= counter.estimate_message(&short));
    }
}
