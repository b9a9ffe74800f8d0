//! Context assembly
//!
//! Builds the message list sent to the model on every step:
//! system prompt, then seeded history, then current-session steps.

use crate::memory::store::{MemoryMessage, MemoryStep, MessageRole};
use crate::model::ModelMessage;

/// Assemble the model context. The three segments are concatenated as-is,
/// never reordered or deduplicated.
pub fn assemble_messages(
    system_prompt: &str,
    history: &[MemoryMessage],
    steps: &[MemoryStep],
) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(1 + history.len() + steps.len() * 2);

    messages.push(ModelMessage::text(MessageRole::System, system_prompt));
    messages.extend(history.iter().map(MemoryMessage::to_message));
    for step in steps {
        messages.extend(step.to_messages());
    }

    messages
}
