//! OpenAI-compatible streaming backend
//!
//! Streams `/chat/completions` over SSE with tool definitions attached.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::Config;
use crate::error::AgentError;
use crate::memory::MessageRole;
use crate::model::{
    ChatModel, DeltaStream, ModelDelta, ModelMessage, ModelRequest, ToolCallDelta, ToolDefinition,
};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Reusable OpenAI client (connection-pooled)
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl OpenAiModel {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model_id: config.model_id.clone(),
        })
    }

    fn to_api_messages(messages: &[ModelMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Vec<ApiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: match &tc.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect();

                let content = if m.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: role_name(m.role),
                    content,
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiTool> {
        tools
            .iter()
            .map(|t| ApiTool {
                r#type: "function".to_string(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream(&self, request: ModelRequest) -> Result<DeltaStream> {
        if self.api_key.is_empty() {
            return Err(AgentError::ModelError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let has_tools = !request.tools.is_empty();

        let body = ChatCompletionRequest {
            model: request.model,
            messages: Self::to_api_messages(&request.messages),
            tools: if has_tools {
                Some(Self::to_api_tools(&request.tools))
            } else {
                None
            },
            tool_choice: if has_tools { Some("required") } else { None },
            stream: true,
        };

        debug!(model = %body.model, messages = body.messages.len(), "Calling OpenAI API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI API request failed: {}", e);
                AgentError::ModelError(format!("OpenAI API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI API error response ({}): {}", status, error_text);
            return Err(AgentError::ModelError(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(sse_deltas(response.bytes_stream()))
    }
}

/// Parse an SSE body into deltas as the caller polls for them.
fn sse_deltas<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let reader = SseReader {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_delta().await?;
        Some((item, reader))
    })
    .boxed()
}

struct SseReader<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S, B, E> SseReader<S>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    /// Next delta from complete lines, reading more of the body when needed.
    /// Bytes are buffered until a newline so multi-byte characters are never split.
    async fn next_delta(&mut self) -> Option<Result<ModelDelta>> {
        loop {
            if self.finished {
                return None;
            }

            while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&line);

                match parse_sse_line(line.trim_end()) {
                    SseLine::Delta(delta) => return Some(Ok(delta)),
                    SseLine::Done => {
                        self.finished = true;
                        return None;
                    }
                    SseLine::Skip => {}
                }
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(AgentError::ModelError(format!(
                        "OpenAI stream interrupted: {}",
                        e
                    ))));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(ModelDelta),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            return SseLine::Skip;
        }
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return SseLine::Skip;
    };

    let delta = ModelDelta {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        tool_calls: choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallDelta {
                index: tc.index,
                id: tc.id,
                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                arguments: tc.function.and_then(|f| f.arguments),
            })
            .collect(),
    };

    if delta.content.is_none() && delta.tool_calls.is_empty() {
        SseLine::Skip
    } else {
        SseLine::Delta(delta)
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
