//! Weather Agent Relay
//!
//! A thin HTTP service that:
//! - Accepts chat turns from the frontend
//! - Rebuilds prior turns into the agent's seeded memory
//! - Runs a tool-calling agent (weather tool + final-answer sentinel)
//! - Relays the agent's events as a line-delimited stream
//!
//! FLOW:
//! REQUEST → HISTORY → AGENT → EVENTS → WIRE LINES

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod models;
pub mod tools;
pub mod translator;

pub use error::Result;

// Re-export common types
pub use agent::{AgentEvent, AgentFactory, ToolCallingAgent};
pub use config::Config;
pub use models::*;
pub use translator::WireEvent;
