//! Schemagen: Prisma schema generation with a validate-and-repair loop
//!
//! Turns natural-language requirements into a Prisma schema, checks it with
//! the Prisma CLI, and asks an LLM to fix whatever the CLI rejects.
//!
//! ## Key Components
//!
//! - `SchemaStore`: persistence of the single schema artifact
//! - `SchemaValidator`: external check (`prisma validate --schema=<path>`)
//! - `SchemaRepairer`: LLM-backed correction requests
//! - `ValidationLoop`: bounded validate/repair orchestration
//! - `SchemaAgent`: one conversational turn, `process(user_text)`

pub mod agent;
pub mod config;
pub mod error;
pub mod fakes;
pub mod fence;
pub mod llm;
pub mod obs;
pub mod repair;
pub mod store;
pub mod telemetry;
pub mod validation;
pub mod validator;

pub use agent::{generation_prompt, generation_system_prompt, AgentReply, SchemaAgent};
pub use config::{AgentConfig, ConfigError};
pub use error::{AgentError, Result};
pub use fence::strip_code_fences;
pub use llm::{ChatMessage, LlmClient, LlmConfig, LlmError, OpenAiClient, Role};
pub use repair::{repair_prompt, SchemaRepairer, REPAIR_SYSTEM_PROMPT};
pub use store::{FsSchemaStore, SchemaStore, StoreError};
pub use telemetry::init_tracing;
pub use validation::{
    FailureReason, ValidationAttempt, ValidationLoop, ValidationOutcome, DEFAULT_MAX_ATTEMPTS,
    EMPTY_SCHEMA_DIAGNOSTIC,
};
pub use validator::{
    select_diagnostic, CheckFailure, CheckReport, PrismaValidator, SchemaValidator,
    ValidatorConfig, UNKNOWN_VALIDATION_ERROR,
};

/// Schemagen version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
