//! Agent memory storage
//!
//! Holds the seeded conversation history and the steps accumulated during
//! the current run.

use crate::model::{ModelMessage, ToolCall};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A prior conversation turn rebuilt for seeding the agent's memory.
///
/// Only ever carries `User` or `Assistant` roles with a single collapsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMessage {
    pub role: MessageRole,
    pub content: String,
}

impl MemoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn to_message(&self) -> ModelMessage {
        ModelMessage::text(self.role, self.content.clone())
    }
}

/// Result of one tool call, as fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolObservation {
    pub tool_call_id: String,
    pub observation: String,
}

/// One step of the current run
#[derive(Debug, Clone)]
pub enum MemoryStep {
    Task {
        task: String,
    },
    Action {
        step_number: usize,
        model_output: String,
        tool_calls: Vec<ToolCall>,
        observations: Vec<ToolObservation>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}

impl MemoryStep {
    /// Messages this step contributes to the model's context.
    pub fn to_messages(&self) -> Vec<ModelMessage> {
        match self {
            MemoryStep::Task { task } => {
                vec![ModelMessage::text(
                    MessageRole::User,
                    format!("New task:\n{}", task),
                )]
            }
            MemoryStep::Action {
                model_output,
                tool_calls,
                observations,
                ..
            } => {
                let mut messages = Vec::with_capacity(observations.len() + 1);
                messages.push(ModelMessage {
                    role: MessageRole::Assistant,
                    content: model_output.clone(),
                    tool_calls: tool_calls.clone(),
                    tool_call_id: None,
                });
                for obs in observations {
                    messages.push(ModelMessage::tool_result(
                        obs.tool_call_id.clone(),
                        obs.observation.clone(),
                    ));
                }
                messages
            }
        }
    }
}

/// Seeded history plus the current session's steps.
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    history: Vec<MemoryMessage>,
    steps: Vec<MemoryStep>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: Vec<MemoryMessage>) -> Self {
        Self {
            history,
            steps: Vec::new(),
        }
    }

    pub fn history(&self) -> &[MemoryMessage] {
        &self.history
    }

    pub fn steps(&self) -> &[MemoryStep] {
        &self.steps
    }

    pub fn push_step(&mut self, step: MemoryStep) {
        self.steps.push(step);
    }

    /// Drop current-session steps. Seeded history survives a reset.
    pub fn reset(&mut self) {
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_step_messages() {
        let step = MemoryStep::Task {
            task: "What's the weather?".to_string(),
        };
        let messages = step.to_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "New task:\nWhat's the weather?");
    }

    #[test]
    fn test_action_step_messages() {
        let step = MemoryStep::Action {
            step_number: 1,
            model_output: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "get_weather".to_string(),
                arguments: json!({"location": "Paris"}),
            }],
            observations: vec![ToolObservation {
                tool_call_id: "call_1".to_string(),
                observation: "sunny".to_string(),
            }],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let messages = step.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[0].tool_calls.len(), 1);
        assert_eq!(messages[1].role, MessageRole::Tool);
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[1].content, "sunny");
    }

    #[test]
    fn test_reset_keeps_history() {
        let mut memory = AgentMemory::with_history(vec![MemoryMessage::user("earlier")]);
        memory.push_step(MemoryStep::Task {
            task: "now".to_string(),
        });
        assert_eq!(memory.steps().len(), 1);

        memory.reset();
        assert!(memory.steps().is_empty());
        assert_eq!(memory.history().len(), 1);
    }
}
