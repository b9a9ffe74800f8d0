//! Agent Memory System
//!
//! Rebuilds prior conversation turns into seeded memory and assembles the
//! model context from system prompt, history and current-session steps.

pub mod context_manager;
pub mod reconstruct;
pub mod store;

pub use context_manager::assemble_messages;
pub use reconstruct::{clean_assistant_text, reconstruct_history, TOOL_CALL_MARKER};
pub use store::{AgentMemory, MemoryMessage, MemoryStep, MessageRole, ToolObservation};
