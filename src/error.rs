//! Error types for the agent relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Agent Run Errors
    // =============================

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // Setup Errors
    // =============================

    #[error("Memory reconstruction error: {0}")]
    MemoryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
