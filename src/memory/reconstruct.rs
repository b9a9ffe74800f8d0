//! Conversation history reconstruction
//!
//! Turns the frontend's prior turns into `MemoryMessage`s for seeding an
//! agent. Assistant turns are cleaned of the `__TOOL_CALL__:` artifacts the
//! frontend embeds when it renders tool cards inline.

use crate::error::AgentError;
use crate::memory::store::MemoryMessage;
use crate::models::ChatMessage;
use crate::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Prefix the frontend puts before an inlined tool-call payload.
pub const TOOL_CALL_MARKER: &str = "__TOOL_CALL__:";

/// Legacy boundary heuristic: the payload ends at the first `}` that is
/// directly followed by the start of prose.
fn tool_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"__TOOL_CALL__:(\{.*?\})(?:I'm|You|Please|The|A|An|\w)")
            .expect("tool-call pattern is a valid regex")
    })
}

/// Rebuild memory messages from prior turns, one per turn with non-blank text.
///
/// Turns with roles other than `user`/`assistant` are skipped. An error here
/// means the history could not be trusted; callers fall back to no history.
pub fn reconstruct_history(messages: &[ChatMessage]) -> Result<Vec<MemoryMessage>> {
    let mut memory = Vec::with_capacity(messages.len());

    for message in messages {
        let text = message.collapsed_text();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match message.role.as_str() {
            "user" => memory.push(MemoryMessage::user(text)),
            "assistant" => memory.push(MemoryMessage::assistant(clean_assistant_text(text)?)),
            other => debug!(role = %other, "Skipping history message with unsupported role"),
        }
    }

    Ok(memory)
}

/// Strip tool-call artifacts from an assistant turn.
///
/// Only turns carrying a marker are touched, so text that is already clean
/// comes back unchanged.
pub fn clean_assistant_text(text: &str) -> Result<String> {
    let text = text.trim();

    if !text.contains(TOOL_CALL_MARKER) {
        return Ok(text.to_string());
    }

    let stripped = strip_tool_call(text)?;
    Ok(collapse_duplicate(&stripped))
}

fn strip_tool_call(text: &str) -> Result<String> {
    let Some(caps) = tool_call_pattern().captures(text) else {
        return Ok(after_first_brace(text));
    };
    let Some(payload_span) = caps.get(1) else {
        return Ok(after_first_brace(text));
    };

    let payload: Value = match serde_json::from_str(payload_span.as_str()) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Tool-call payload is not valid JSON, using fallback");
            return Ok(after_first_brace(text));
        }
    };

    match payload.get("arguments").and_then(|args| args.get("answer")) {
        Some(Value::String(answer)) => Ok(answer.clone()),
        Some(other) => Err(AgentError::MemoryError(format!(
            "tool-call answer is not text: {}",
            other
        ))),
        None => Ok(text[payload_span.end()..].trim().to_string()),
    }
}

/// Everything after the first `}`; the whole text when there is none.
fn after_first_brace(text: &str) -> String {
    match text.split_once('}') {
        Some((_, rest)) => rest.trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Keep only the first half when the token sequence is repeated exactly twice.
fn collapse_duplicate(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > 1 {
        let mid = words.len() / 2;
        if words[..mid] == words[mid..] {
            return words[..mid].join(" ");
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::MessageRole;
    use crate::models::ContentPart;
    use serde_json::Map;

    fn text_message(role: &str, text: &str) -> ChatMessage {
        ChatMessage::new(role, vec![ContentPart::text(text)])
    }

    #[test]
    fn test_one_memory_message_per_turn_in_order() {
        let history = vec![
            text_message("user", "What's the weather in Paris?"),
            text_message("assistant", "It is sunny in Paris."),
            text_message("user", "And in London?"),
        ];

        let memory = reconstruct_history(&history).unwrap();
        assert_eq!(memory.len(), 3);
        assert_eq!(memory[0], MemoryMessage::user("What's the weather in Paris?"));
        assert_eq!(memory[1], MemoryMessage::assistant("It is sunny in Paris."));
        assert_eq!(memory[2], MemoryMessage::user("And in London?"));
    }

    #[test]
    fn test_blank_turns_are_dropped() {
        let history = vec![
            text_message("user", "   "),
            ChatMessage::new("assistant", vec![]),
            ChatMessage::new(
                "user",
                vec![ContentPart::text(""), ContentPart::text("\n\t")],
            ),
        ];
        assert!(reconstruct_history(&history).unwrap().is_empty());
    }

    #[test]
    fn test_non_text_parts_are_ignored() {
        let history = vec![ChatMessage::new(
            "user",
            vec![
                ContentPart {
                    kind: "tool-call".to_string(),
                    text: "ignored".to_string(),
                    status: Map::new(),
                },
                ContentPart::text(" Hello "),
            ],
        )];

        let memory = reconstruct_history(&history).unwrap();
        assert_eq!(memory, vec![MemoryMessage::user("Hello")]);
    }

    #[test]
    fn test_unknown_roles_are_skipped() {
        let history = vec![text_message("system", "ignored"), text_message("user", "kept")];
        let memory = reconstruct_history(&history).unwrap();
        assert_eq!(memory.len(), 1);
        assert_eq!(memory[0].role, MessageRole::User);
    }

    #[test]
    fn test_user_text_is_not_cleaned() {
        let memory = reconstruct_history(&[text_message("user", "again again")]).unwrap();
        assert_eq!(memory[0].content, "again again");
    }

    #[test]
    fn test_answer_is_extracted_from_final_answer_payload() {
        let text = r#"__TOOL_CALL__:{"name":"final_answer","arguments":{"answer":"It is sunny."},"result":"It is sunny."}It is sunny."#;
        assert_eq!(clean_assistant_text(text).unwrap(), "It is sunny.");
    }

    #[test]
    fn test_text_after_payload_without_answer() {
        let text = r#"__TOOL_CALL__:{"name":"get_weather","arguments":{"location":"Paris"},"result":"sunny"}The weather in Paris is sunny."#;
        assert_eq!(
            clean_assistant_text(text).unwrap(),
            "The weather in Paris is sunny."
        );
    }

    #[test]
    fn test_unparseable_payload_falls_back_to_first_brace() {
        let text = "__TOOL_CALL__:{not json}Here you go";
        assert_eq!(clean_assistant_text(text).unwrap(), "Here you go");
    }

    #[test]
    fn test_marker_without_boundary_falls_back_to_first_brace() {
        let text = "__TOOL_CALL__:{\"name\":\"x\"} ... done";
        assert_eq!(clean_assistant_text(text).unwrap(), "... done");
    }

    #[test]
    fn test_non_text_answer_is_an_error() {
        let text = r#"__TOOL_CALL__:{"name":"final_answer","arguments":{"answer":42}}Done"#;
        let result = clean_assistant_text(text);
        assert!(matches!(result, Err(AgentError::MemoryError(_))));
        assert!(reconstruct_history(&[text_message("assistant", text)]).is_err());
    }

    #[test]
    fn test_duplicated_text_collapses() {
        let text = r#"__TOOL_CALL__:{"name":"get_weather","arguments":{"location":"Rome"}}It is sunny today. It is sunny today."#;
        assert_eq!(clean_assistant_text(text).unwrap(), "It is sunny today.");
    }

    #[test]
    fn test_doubled_text_without_marker_is_kept() {
        assert_eq!(clean_assistant_text("ok ok ok ok").unwrap(), "ok ok ok ok");
        assert_eq!(clean_assistant_text("Sunny. Sunny.").unwrap(), "Sunny. Sunny.");
    }

    #[test]
    fn test_replaying_reconstructed_history_is_stable() {
        let history = vec![
            text_message("assistant", "ok ok ok ok"),
            text_message(
                "assistant",
                r#"__TOOL_CALL__:{"name":"get_weather","arguments":{"location":"Oslo"}}ok ok ok ok"#,
            ),
        ];

        let first = reconstruct_history(&history).unwrap();
        assert_eq!(first[0].content, "ok ok ok ok");
        assert_eq!(first[1].content, "ok ok");

        let replayed: Vec<ChatMessage> = first
            .iter()
            .map(|m| text_message("assistant", &m.content))
            .collect();
        assert_eq!(reconstruct_history(&replayed).unwrap(), first);
    }

    #[test]
    fn test_duplicated_answer_after_payload_collapses() {
        let text = r#"__TOOL_CALL__:{"name":"get_weather","arguments":{"location":"Oslo"}}Cold and clear. Cold and clear."#;
        assert_eq!(clean_assistant_text(text).unwrap(), "Cold and clear.");
    }

    #[test]
    fn test_odd_token_count_is_kept() {
        assert_eq!(clean_assistant_text("a b a").unwrap(), "a b a");
    }

    #[test]
    fn test_cleaning_clean_text_is_a_no_op() {
        let once = clean_assistant_text("The weather in Paris is sunny.").unwrap();
        let twice = clean_assistant_text(&once).unwrap();
        assert_eq!(once, "The weather in Paris is sunny.");
        assert_eq!(twice, once);

        let history = vec![
            text_message("user", "Weather?"),
            text_message("assistant", &once),
        ];
        let first = reconstruct_history(&history).unwrap();
        let replayed: Vec<ChatMessage> = first
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::User => "user",
                    _ => "assistant",
                };
                text_message(role, &m.content)
            })
            .collect();
        assert_eq!(reconstruct_history(&replayed).unwrap(), first);
    }
}
