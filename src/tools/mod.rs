//! Tool trait and registry
//!
//! Tools are invoked by the agent when the model asks for them. The
//! `final_answer` tool is the sentinel the agent uses to end a run.

use crate::error::AgentError;
use crate::model::ToolDefinition;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the sentinel tool that terminates a run.
pub const FINAL_ANSWER_TOOL: &str = "final_answer";

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the tool's arguments object.
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: &Value) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry for looking up and executing tools.
/// Keeps registration order so the model always sees the same tool list.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.execute(arguments).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments.get(key).and_then(Value::as_str).ok_or_else(|| {
        AgentError::InvalidToolInput(format!("Expected string '{}' in tool arguments", key))
    })
}

/// Stub weather lookup; always reports the same pleasant weather.
pub struct GetWeatherTool;

#[async_trait::async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> &'static str {
        "Get the current weather for a given location. ONLY use this tool if the user has \
         explicitly asked for the weather or if the weather can help solve the user's question."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The location to get weather for."
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let location = require_str(arguments, "location")?;
        Ok(Value::String(format!(
            "The weather in {} is sunny with a temperature of 72°F (22°C). Perfect day to be outside!",
            location
        )))
    }
}

/// Sentinel tool: returns its `answer` argument unchanged.
pub struct FinalAnswerTool;

#[async_trait::async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> &'static str {
        FINAL_ANSWER_TOOL
    }

    fn description(&self) -> &'static str {
        "Provides a final answer to the given problem."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The final answer to the problem"
                }
            },
            "required": ["answer"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        arguments.get("answer").cloned().ok_or_else(|| {
            AgentError::InvalidToolInput("Expected 'answer' in final_answer arguments".to_string())
        })
    }
}

/// Registry with the tools every chat agent gets.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GetWeatherTool));
    registry
}
