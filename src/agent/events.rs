//! Events emitted by an agent run, in the order they happen.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The model asked for a tool call; about to execute it.
    ToolCallStart {
        id: String,
        name: String,
        arguments: Value,
    },

    /// A tool call finished. `tool_name` is the parent call's tool.
    ToolOutput {
        id: String,
        tool_name: String,
        output: Value,
        observation: String,
        is_final_answer: bool,
    },

    /// Content fragment streamed by the model.
    TextDelta { content: String },

    /// End of one action step.
    ActionOutput {
        output: Option<Value>,
        is_final_answer: bool,
    },

    /// The run's answer. Always the last event of a successful run.
    FinalAnswer { output: Value },

    /// Bookkeeping marker after each step.
    StepComplete {
        step_number: usize,
        duration_ms: u64,
    },
}

impl AgentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolOutput { .. } => "tool_output",
            Self::TextDelta { .. } => "text_delta",
            Self::ActionOutput { .. } => "action_output",
            Self::FinalAnswer { .. } => "final_answer",
            Self::StepComplete { .. } => "step_complete",
        }
    }
}
