//! Error types for the schema agent

use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::store::StoreError;

/// Errors that abort a conversational turn or agent construction
#[derive(Error, Debug)]
pub enum AgentError {
    /// Generation request failed
    #[error("{0}")]
    Llm(#[from] LlmError),

    /// Reading or writing the schema file failed
    #[error("{0}")]
    Storage(#[from] StoreError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
