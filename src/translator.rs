//! Event translation to the frontend's line protocol
//!
//! Each wire record is written as `0:<json>\n`; the stream always ends
//! with `d:\n`.

use crate::agent::AgentEvent;
use crate::tools::FINAL_ANSWER_TOOL;
use crate::Result;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// Terminal line of every stream.
pub const END_MARKER: &str = "d:\n";

/// One JSON record of the outbound stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    ToolCallStart {
        tool_name: String,
        tool_arguments: Value,
        tool_call_id: String,
    },
    ToolCallComplete {
        tool_name: String,
        tool_call_id: String,
        result: Value,
        observation: String,
        is_final_answer: bool,
    },
    Text {
        content: String,
    },
    Error {
        message: String,
    },
}

impl WireEvent {
    /// Frame as one protocol line.
    pub fn to_line(&self) -> String {
        // A derived Serialize over String/Value/bool fields cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("0:{}\n", json)
    }
}

/// Map one agent event to zero or more wire records.
pub fn translate(event: &AgentEvent) -> Vec<WireEvent> {
    match event {
        AgentEvent::ToolCallStart { name, .. } if name == FINAL_ANSWER_TOOL => Vec::new(),
        AgentEvent::ToolCallStart {
            id,
            name,
            arguments,
        } => vec![WireEvent::ToolCallStart {
            tool_name: name.clone(),
            tool_arguments: arguments.clone(),
            tool_call_id: id.clone(),
        }],

        // The sentinel's answer is replayed as typing, one character at a time.
        AgentEvent::ToolOutput {
            tool_name, output, ..
        } if tool_name == FINAL_ANSWER_TOOL => value_text(output)
            .chars()
            .map(|c| WireEvent::Text {
                content: c.to_string(),
            })
            .collect(),
        AgentEvent::ToolOutput {
            id,
            tool_name,
            output,
            observation,
            is_final_answer,
        } => vec![WireEvent::ToolCallComplete {
            tool_name: tool_name.clone(),
            tool_call_id: id.clone(),
            result: output.clone(),
            observation: observation.clone(),
            is_final_answer: *is_final_answer,
        }],

        AgentEvent::TextDelta { content } if content.is_empty() => Vec::new(),
        AgentEvent::TextDelta { content } => vec![WireEvent::Text {
            content: content.clone(),
        }],

        // Already delivered through the sentinel tool's output.
        AgentEvent::ActionOutput { .. } | AgentEvent::FinalAnswer { .. } => Vec::new(),

        AgentEvent::StepComplete { .. } => Vec::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Translate a run's event stream into protocol lines.
///
/// The first error becomes a single `error` record and ends the stream;
/// the end marker is always appended.
pub fn into_wire_lines<S>(events: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<AgentEvent>> + Send,
{
    let mut failed = false;

    events
        .take_while(move |item| {
            let keep = !failed;
            if item.is_err() {
                failed = true;
            }
            futures::future::ready(keep)
        })
        .flat_map(|item| {
            let records = match item {
                Ok(event) => translate(&event),
                Err(e) => {
                    error!(error = %e, "Agent run ended with an error");
                    vec![WireEvent::Error {
                        message: e.to_string(),
                    }]
                }
            };
            stream::iter(records.into_iter().map(|record| record.to_line()))
        })
        .chain(stream::once(futures::future::ready(END_MARKER.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use serde_json::json;

    fn tool_output(tool_name: &str, output: Value, is_final_answer: bool) -> AgentEvent {
        AgentEvent::ToolOutput {
            id: "call_1".to_string(),
            tool_name: tool_name.to_string(),
            output: output.clone(),
            observation: value_text(&output),
            is_final_answer,
        }
    }

    #[test]
    fn test_tool_call_start_for_regular_tool() {
        let records = translate(&AgentEvent::ToolCallStart {
            id: "call_1".to_string(),
            name: "get_weather".to_string(),
            arguments: json!({"location": "Paris"}),
        });
        assert_eq!(
            records,
            vec![WireEvent::ToolCallStart {
                tool_name: "get_weather".to_string(),
                tool_arguments: json!({"location": "Paris"}),
                tool_call_id: "call_1".to_string(),
            }]
        );
    }

    #[test]
    fn test_sentinel_call_start_is_suppressed() {
        let records = translate(&AgentEvent::ToolCallStart {
            id: "call_2".to_string(),
            name: FINAL_ANSWER_TOOL.to_string(),
            arguments: json!({"answer": "hi"}),
        });
        assert!(records.is_empty());
    }

    #[test]
    fn test_sentinel_output_streams_characters() {
        let records = translate(&tool_output(FINAL_ANSWER_TOOL, json!("Hé!"), true));
        let chars: Vec<&str> = records
            .iter()
            .map(|r| match r {
                WireEvent::Text { content } => content.as_str(),
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        assert_eq!(chars, vec!["H", "é", "!"]);
    }

    #[test]
    fn test_non_text_sentinel_output_is_rendered_as_json() {
        let records = translate(&tool_output(FINAL_ANSWER_TOOL, json!({"t": 1}), true));
        let text: String = records
            .iter()
            .map(|r| match r {
                WireEvent::Text { content } => content.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(text, r#"{"t":1}"#);
    }

    #[test]
    fn test_regular_tool_output_completes_call() {
        let records = translate(&tool_output("get_weather", json!("sunny"), false));
        assert_eq!(
            records,
            vec![WireEvent::ToolCallComplete {
                tool_name: "get_weather".to_string(),
                tool_call_id: "call_1".to_string(),
                result: json!("sunny"),
                observation: "sunny".to_string(),
                is_final_answer: false,
            }]
        );
    }

    #[test]
    fn test_text_deltas_and_suppressed_events() {
        assert_eq!(
            translate(&AgentEvent::TextDelta {
                content: "Hi".to_string()
            }),
            vec![WireEvent::Text {
                content: "Hi".to_string()
            }]
        );
        assert!(translate(&AgentEvent::TextDelta {
            content: String::new()
        })
        .is_empty());
        assert!(translate(&AgentEvent::ActionOutput {
            output: Some(json!("x")),
            is_final_answer: true
        })
        .is_empty());
        assert!(translate(&AgentEvent::FinalAnswer { output: json!("x") }).is_empty());
        assert!(translate(&AgentEvent::StepComplete {
            step_number: 1,
            duration_ms: 3
        })
        .is_empty());
    }

    #[test]
    fn test_line_framing() {
        let line = WireEvent::Text {
            content: "a".to_string(),
        }
        .to_line();
        assert_eq!(line, "0:{\"type\":\"text\",\"content\":\"a\"}\n");

        let line = WireEvent::Error {
            message: "boom".to_string(),
        }
        .to_line();
        assert_eq!(line, "0:{\"type\":\"error\",\"message\":\"boom\"}\n");
    }

    #[tokio::test]
    async fn test_stream_ends_with_marker() {
        let events = stream::iter(vec![Ok(AgentEvent::TextDelta {
            content: "Hi".to_string(),
        })]);
        let lines: Vec<String> = into_wire_lines(events).collect().await;
        assert_eq!(
            lines,
            vec!["0:{\"type\":\"text\",\"content\":\"Hi\"}\n".to_string(), END_MARKER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_error_is_reported_once_then_stream_ends() {
        let events = stream::iter(vec![
            Ok(AgentEvent::TextDelta {
                content: "a".to_string(),
            }),
            Err(AgentError::ModelError("weather service down".to_string())),
            Ok(AgentEvent::TextDelta {
                content: "late".to_string(),
            }),
        ]);
        let lines: Vec<String> = into_wire_lines(events).collect().await;

        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0:{\"type\":\"error\""));
        assert!(lines[1].contains("weather service down"));
        assert_eq!(lines[2], END_MARKER);
    }

    #[tokio::test]
    async fn test_empty_stream_still_terminates() {
        let events = stream::iter(Vec::<Result<AgentEvent>>::new());
        let lines: Vec<String> = into_wire_lines(events).collect().await;
        assert_eq!(lines, vec![END_MARKER.to_string()]);
    }
}
