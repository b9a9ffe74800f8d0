//! Model backend trait and implementations
//!
//! A backend takes the assembled context plus tool definitions and streams
//! back content and tool-call fragments.

use crate::error::AgentError;
use crate::memory::MessageRole;
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub mod openai;
pub use openai::OpenAiModel;

/// A fully assembled tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One message of the model context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Tool signature advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Fragment of a tool call; fragments sharing an `index` belong together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One streamed chunk of model output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDelta {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
}

impl ModelDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A complete tool call delivered in a single fragment.
    pub fn tool_call(index: u32, id: &str, name: &str, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCallDelta {
                index,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments: Some(arguments.to_string()),
            }],
        }
    }
}

pub type DeltaStream = BoxStream<'static, Result<ModelDelta>>;

/// Trait for streaming chat completion (LLM controlled)
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn stream(&self, request: ModelRequest) -> Result<DeltaStream>;
}

/// Scripted backend for development & testing
/// Replays one canned turn per call, no network involved
pub struct ScriptedModel {
    model_id: String,
    turns: Mutex<VecDeque<Vec<ModelDelta>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<Vec<ModelDelta>>) -> Self {
        Self {
            model_id: crate::config::MODEL_ID.to_string(),
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A weather lookup followed by a final answer.
    pub fn weather_demo() -> Self {
        Self::new(vec![
            vec![ModelDelta::tool_call(
                0,
                "call_weather",
                "get_weather",
                serde_json::json!({"location": "San Francisco"}),
            )],
            vec![ModelDelta::tool_call(
                0,
                "call_answer",
                "final_answer",
                serde_json::json!({
                    "answer": "It's sunny in San Francisco at 72°F (22°C)."
                }),
            )],
        ])
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream(&self, request: ModelRequest) -> Result<DeltaStream> {
        self.requests.lock().await.push(request);

        let turn = self.turns.lock().await.pop_front().ok_or_else(|| {
            AgentError::ModelError("Scripted model has no turns left".to_string())
        })?;

        Ok(stream::iter(turn.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            model: "test".to_string(),
            messages: vec![ModelMessage::text(MessageRole::User, "hi")],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_scripted_model_replays_turns_in_order() {
        let model = ScriptedModel::new(vec![
            vec![ModelDelta::content("first")],
            vec![ModelDelta::content("second")],
        ]);

        let first: Vec<_> = model.stream(request()).await.unwrap().collect().await;
        let second: Vec<_> = model.stream(request()).await.unwrap().collect().await;

        assert_eq!(first[0].as_ref().unwrap().content.as_deref(), Some("first"));
        assert_eq!(second[0].as_ref().unwrap().content.as_deref(), Some("second"));
        assert_eq!(model.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_model_errors_when_exhausted() {
        let model = ScriptedModel::new(vec![]);
        let result = model.stream(request()).await;
        assert!(matches!(result, Err(AgentError::ModelError(_))));
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ModelMessage::text(MessageRole::User, "hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
