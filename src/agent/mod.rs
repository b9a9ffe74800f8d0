//! Tool-calling agent - implements the run loop
//!
//! TASK → MODEL → TOOL CALLS → OBSERVE → ... → FINAL ANSWER

pub mod events;
pub mod factory;

pub use events::AgentEvent;
pub use factory::{AgentFactory, SYSTEM_PROMPT};

use crate::error::AgentError;
use crate::memory::{
    assemble_messages, AgentMemory, MemoryMessage, MemoryStep, MessageRole, ToolObservation,
};
use crate::model::{ChatModel, ModelMessage, ModelRequest, ToolCall, ToolCallDelta};
use crate::tools::{FinalAnswerTool, ToolRegistry, FINAL_ANSWER_TOOL};
use crate::Result;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

const DEFAULT_MAX_STEPS: usize = 20;

const FINAL_ANSWER_PROMPT: &str = "You have run out of steps. Based on everything above, \
     give your best final answer to the original task now, as plain text.";

/// Ordered events of one run. A failed run ends with a single `Err` item.
pub type EventStream = BoxStream<'static, Result<AgentEvent>>;

/// Hands events to the consumer one at a time.
///
/// The channel holds a single event, so `emit` waits until the consumer has
/// taken the previous one.
struct EventSink {
    tx: mpsc::Sender<Result<AgentEvent>>,
}

impl EventSink {
    async fn emit(&self, event: AgentEvent) {
        trace!(event = event.kind(), "Emitting agent event");
        // The receiver lives in the same stream as the run, so it outlives every send.
        let _ = self.tx.send(Ok(event)).await;
    }

    async fn fail(&self, error: AgentError) {
        let _ = self.tx.send(Err(error)).await;
    }
}

/// Collects streamed fragments of one tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn absorb(&mut self, fragment: ToolCallDelta) {
        if let Some(id) = fragment.id {
            self.id = Some(id);
        }
        if let Some(name) = fragment.name {
            self.name = name;
        }
        if let Some(arguments) = fragment.arguments {
            self.arguments.push_str(&arguments);
        }
    }

    fn finish(self) -> ToolCall {
        ToolCall {
            id: self
                .id
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple())),
            name: self.name,
            arguments: parse_arguments(&self.arguments),
        }
    }
}

/// Argument text that is not JSON is handed to the tool as a JSON string.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn render_observation(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Agent that loops model turns and tool calls until `final_answer` is called
pub struct ToolCallingAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: String,
    memory: AgentMemory,
    max_steps: usize,
}

impl ToolCallingAgent {
    /// The sentinel `final_answer` tool is always added to `tools`.
    pub fn new(
        model: Arc<dyn ChatModel>,
        mut tools: ToolRegistry,
        system_prompt: impl Into<String>,
    ) -> Self {
        tools.register(Arc::new(FinalAnswerTool));

        Self {
            model,
            tools,
            system_prompt: system_prompt.into(),
            memory: AgentMemory::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Seed prior conversation turns ahead of the current session.
    pub fn with_history(mut self, history: Vec<MemoryMessage>) -> Self {
        self.memory = AgentMemory::with_history(history);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The context the model sees on the next step.
    pub fn write_memory_to_messages(&self) -> Vec<ModelMessage> {
        assemble_messages(&self.system_prompt, self.memory.history(), self.memory.steps())
    }

    /// Turn a run into its event stream.
    ///
    /// Nothing happens until the stream is polled, and the run only advances
    /// while its consumer keeps polling. Dropping the stream drops the run,
    /// including any model call or tool in flight.
    ///
    /// `reset` drops steps from earlier runs; seeded history always survives.
    pub fn run_stream(mut self, task: impl Into<String>, reset: bool) -> EventStream {
        let task = task.into();
        let (tx, rx) = mpsc::channel(1);

        let run = async move {
            let sink = EventSink { tx };
            if let Err(e) = self.run(task, reset, &sink).await {
                error!(error = %e, "Agent run failed");
                sink.fail(e).await;
            }
        };

        // The run future yields no items; it is polled alongside the receiver
        // and every event travels through the channel in order.
        let driver = stream::once(run)
            .filter_map(|()| futures::future::ready(None::<Result<AgentEvent>>));
        stream::select(ReceiverStream::new(rx), driver).boxed()
    }

    async fn run(&mut self, task: String, reset: bool, sink: &EventSink) -> Result<()> {
        if reset {
            self.memory.reset();
        }

        info!(
            model = %self.model.model_id(),
            history = self.memory.history().len(),
            "Starting agent run"
        );
        self.memory.push_step(MemoryStep::Task { task });

        for step_number in 1..=self.max_steps {
            let started = Instant::now();
            let answer = self.step(step_number, sink).await?;

            sink.emit(AgentEvent::StepComplete {
                step_number,
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await;

            if let Some(output) = answer {
                info!(steps = step_number, "Agent run finished");
                sink.emit(AgentEvent::FinalAnswer { output }).await;
                return Ok(());
            }
        }

        warn!(max_steps = self.max_steps, "Step budget exhausted, requesting final answer");
        let output = self.provide_final_answer(sink).await?;
        sink.emit(AgentEvent::FinalAnswer { output }).await;
        Ok(())
    }

    /// One model turn plus the tool calls it asked for.
    /// Returns the final answer when this step produced one.
    async fn step(&mut self, step_number: usize, sink: &EventSink) -> Result<Option<Value>> {
        let started_at = Utc::now();
        let request = ModelRequest {
            model: self.model.model_id().to_string(),
            messages: self.write_memory_to_messages(),
            tools: self.tools.definitions(),
        };

        let mut deltas = self.model.stream(request).await?;
        let mut model_output = String::new();
        let mut pending: BTreeMap<u32, ToolCallAccumulator> = BTreeMap::new();

        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                model_output.push_str(&content);
                sink.emit(AgentEvent::TextDelta { content }).await;
            }
            for fragment in delta.tool_calls {
                pending.entry(fragment.index).or_default().absorb(fragment);
            }
        }

        let tool_calls: Vec<ToolCall> = pending
            .into_values()
            .map(ToolCallAccumulator::finish)
            .collect();

        debug!(step_number, tool_calls = tool_calls.len(), "Model turn complete");

        if tool_calls.is_empty() {
            // A reply without tool calls is the answer itself.
            let output = Value::String(model_output.clone());
            self.memory.push_step(MemoryStep::Action {
                step_number,
                model_output,
                tool_calls,
                observations: Vec::new(),
                started_at,
                finished_at: Utc::now(),
            });
            sink.emit(AgentEvent::ActionOutput {
                output: Some(output.clone()),
                is_final_answer: true,
            })
            .await;
            return Ok(Some(output));
        }

        let mut observations = Vec::with_capacity(tool_calls.len());
        let mut final_output = None;

        for call in &tool_calls {
            sink.emit(AgentEvent::ToolCallStart {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await;

            debug!(tool = %call.name, call_id = %call.id, "Executing tool");
            let output = self.tools.execute(&call.name, &call.arguments).await?;
            let observation = render_observation(&output);
            let is_final_answer = call.name == FINAL_ANSWER_TOOL;

            sink.emit(AgentEvent::ToolOutput {
                id: call.id.clone(),
                tool_name: call.name.clone(),
                output: output.clone(),
                observation: observation.clone(),
                is_final_answer,
            })
            .await;

            observations.push(ToolObservation {
                tool_call_id: call.id.clone(),
                observation,
            });
            if is_final_answer {
                final_output = Some(output);
            }
        }

        self.memory.push_step(MemoryStep::Action {
            step_number,
            model_output,
            tool_calls,
            observations,
            started_at,
            finished_at: Utc::now(),
        });

        sink.emit(AgentEvent::ActionOutput {
            output: final_output.clone(),
            is_final_answer: final_output.is_some(),
        })
        .await;

        Ok(final_output)
    }

    /// Last resort after the step budget: one tool-less model turn.
    async fn provide_final_answer(&mut self, sink: &EventSink) -> Result<Value> {
        let mut messages = self.write_memory_to_messages();
        messages.push(ModelMessage::text(MessageRole::User, FINAL_ANSWER_PROMPT));

        let request = ModelRequest {
            model: self.model.model_id().to_string(),
            messages,
            tools: Vec::new(),
        };

        let mut deltas = self.model.stream(request).await?;
        let mut answer = String::new();

        while let Some(delta) = deltas.next().await {
            if let Some(content) = delta?.content.filter(|c| !c.is_empty()) {
                answer.push_str(&content);
                sink.emit(AgentEvent::TextDelta { content }).await;
            }
        }

        Ok(Value::String(answer))
    }
}
