//! Conversational front end.
//!
//! One turn: generate a schema from the user's requirements, run it through
//! the [`ValidationLoop`], persist it when accepted, and compose a reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::fence::strip_code_fences;
use crate::llm::{LlmClient, LlmError, OpenAiClient};
use crate::repair::SchemaRepairer;
use crate::store::FsSchemaStore;
use crate::validation::{ValidationLoop, ValidationOutcome, DEFAULT_MAX_ATTEMPTS};
use crate::validator::PrismaValidator;

/// Build the generation system instruction.
pub fn generation_system_prompt(database_url: Option<&str>) -> String {
    let mut requirements = vec![
        "Always include 'generator client' and 'datasource db' blocks".to_string(),
        "Use PostgreSQL as the database provider".to_string(),
        "Define all necessary models with appropriate fields".to_string(),
        "Use proper Prisma field types (String, Int, Float, Boolean, DateTime, Json, etc.)"
            .to_string(),
        "Include necessary relations between models".to_string(),
        "Add appropriate constraints and indexes when needed".to_string(),
    ];
    if let Some(url) = database_url {
        requirements.push(format!("{url} is the database URL"));
    }

    let bullets = requirements
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Prisma schema expert. Generate valid, production-ready Prisma schemas based on user requirements.

Requirements:
{bullets}

Return only the complete, valid Prisma schema without any additional explanations."
    )
}

/// Build the user prompt wrapping the raw requirements.
pub fn generation_prompt(requirements: &str) -> String {
    format!(
        "Based on the following user requirements, generate a complete Prisma schema file.

User Requirements:
{requirements}

Please generate a valid Prisma schema that matches these requirements. Include all necessary models, fields, and relationships.

Return ONLY the Prisma schema, starting with 'generator client' and including the 'datasource db' block. Use the postgresql provider with 'postgresql' as the provider."
    )
}

/// Reply for one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub success: bool,
    pub message: String,
}

/// Schema generation agent.
pub struct SchemaAgent {
    llm: Arc<dyn LlmClient>,
    validation: ValidationLoop,
    max_attempts: u32,
    database_url: Option<String>,
}

impl SchemaAgent {
    pub fn new(llm: Arc<dyn LlmClient>, validation: ValidationLoop) -> Self {
        Self {
            llm,
            validation,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            database_url: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_database_url(mut self, database_url: Option<String>) -> Self {
        self.database_url = database_url;
        self
    }

    /// Wire the filesystem store, the Prisma CLI validator, and the OpenAI
    /// client from `config`. The same client generates and repairs.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(config.llm.clone())?);
        let store = Arc::new(FsSchemaStore::new(&config.schema_dir, &config.schema_file)?);
        let validator = Arc::new(PrismaValidator::new(config.validator.clone()));
        let validation =
            ValidationLoop::new(validator, SchemaRepairer::new(Some(llm.clone())), store);

        info!(
            model = %config.llm.model,
            schema_path = %validation.store().path().display(),
            max_attempts = config.max_attempts,
            "schema agent initialized"
        );

        Ok(Self::new(llm, validation)
            .with_max_attempts(config.max_attempts)
            .with_database_url(config.database_url.clone()))
    }

    pub fn validation(&self) -> &ValidationLoop {
        &self.validation
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Ask the LLM for a schema and strip any code fences from the reply.
    pub async fn generate(&self, requirements: &str) -> std::result::Result<String, LlmError> {
        info!("Generating Prisma schema from user input");
        let system = generation_system_prompt(self.database_url.as_deref());
        let reply = self
            .llm
            .complete(&system, &generation_prompt(requirements))
            .await?;
        let schema = strip_code_fences(&reply);
        info!(chars = schema.len(), "Generated schema");
        Ok(schema)
    }

    /// Run one turn.
    ///
    /// Generation and storage failures are errors; a schema that never
    /// validates is an unsuccessful reply.
    pub async fn process(&self, user_text: &str) -> Result<AgentReply> {
        let schema = self.generate(user_text).await?;
        let outcome = self.validation.validate(&schema, self.max_attempts).await?;

        match outcome {
            ValidationOutcome::Passed { schema, .. } => {
                let store = self.validation.store();
                store.write(&schema)?;
                info!("Schema generated and validated successfully");
                Ok(AgentReply {
                    success: true,
                    message: format!(
                        "Successfully generated and validated Prisma schema!\n\nSchema saved to {}\n\nGenerated schema:\n{}",
                        store.path().display(),
                        schema
                    ),
                })
            }
            ValidationOutcome::Failed {
                schema,
                diagnostic,
                attempts,
                ..
            } => {
                error!(diagnostic = %diagnostic, "Schema validation failed");
                Ok(AgentReply {
                    success: false,
                    message: format!(
                        "Failed to validate the generated schema after {attempts} attempts.\n\nError: {diagnostic}\n\nGenerated schema:\n{schema}"
                    ),
                })
            }
        }
    }

    /// Like [`process`](Self::process), with errors folded into the reply.
    pub async fn respond(&self, user_text: &str) -> AgentReply {
        match self.process(user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Error processing input");
                AgentReply {
                    success: false,
                    message: format!("I encountered an error while generating the schema: {e}"),
                }
            }
        }
    }
}

impl std::fmt::Debug for SchemaAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaAgent")
            .field("validation", &self.validation)
            .field("max_attempts", &self.max_attempts)
            .field("database_url", &self.database_url.is_some())
            .finish()
    }
}
