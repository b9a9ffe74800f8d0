//! Agent construction
//!
//! Every chat request gets a fresh agent bound to the weather tool and the
//! configured model, optionally seeded with the request's prior turns.

use crate::agent::ToolCallingAgent;
use crate::config::Config;
use crate::memory::reconstruct_history;
use crate::model::ChatModel;
use crate::models::ChatMessage;
use crate::tools::create_default_registry;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SYSTEM_PROMPT: &str = r#"You are a friendly, concise assistant that can look up the weather.

Guidelines:
- Only call `get_weather` when the user asks about the weather or it genuinely helps answer the question
- Use the earlier conversation for context
- Always finish by calling the `final_answer` tool with your complete reply to the user"#;

pub struct AgentFactory {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    max_steps: usize,
}

impl AgentFactory {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            model,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_steps: config.max_steps,
        }
    }

    /// Build an agent for one request.
    ///
    /// History that cannot be rebuilt is dropped; the agent then runs with
    /// the current session only.
    pub fn create_agent(&self, history: &[ChatMessage]) -> ToolCallingAgent {
        let agent = ToolCallingAgent::new(
            self.model.clone(),
            create_default_registry(),
            self.system_prompt.clone(),
        )
        .with_max_steps(self.max_steps);

        if history.is_empty() {
            return agent;
        }

        match reconstruct_history(history) {
            Ok(memory) => {
                debug!(
                    received = history.len(),
                    seeded = memory.len(),
                    "Seeding agent memory from conversation history"
                );
                agent.with_history(memory)
            }
            Err(e) => {
                warn!(error = %e, "Could not rebuild conversation history, starting fresh");
                agent
            }
        }
    }
}
