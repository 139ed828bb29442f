//! LLM-assisted schema repair.
//!
//! [`SchemaRepairer`] turns a failing candidate plus the validator diagnostic
//! into a correction request. Repair never fails: without an LLM, or when the
//! LLM errors, the candidate comes back unchanged.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::fence::strip_code_fences;
use crate::llm::LlmClient;

/// System instruction for repair requests.
pub const REPAIR_SYSTEM_PROMPT: &str = "You are an expert at fixing Prisma schemas. Your job is to identify and fix syntax errors, validation issues, and schema problems in Prisma schema files.

When fixing schemas:
1. Ensure all model definitions are correct
2. Check that field types are valid
3. Verify relation syntax is correct
4. Do not change or add any extra information such as relations, fields, etc.

Return only the complete fixed schema in a prisma code block.";

/// Build the user prompt for one repair request.
pub fn repair_prompt(candidate: &str, diagnostic: &str) -> String {
    format!(
        "You are a Prisma schema expert. Fix the following Prisma schema based on the error message.

Error:
{diagnostic}

Current Schema:
```prisma
{candidate}
```

Please provide the fixed Prisma schema. Return ONLY the complete, corrected schema without any explanations or markdown formatting outside of the code block."
    )
}

/// Requests corrected schemas from an optional LLM collaborator.
#[derive(Clone, Default)]
pub struct SchemaRepairer {
    llm: Option<Arc<dyn LlmClient>>,
}

impl SchemaRepairer {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    /// Repairer with no LLM; every repair is a no-op.
    pub fn disabled() -> Self {
        Self { llm: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.llm.is_some()
    }

    /// Ask the LLM to fix `candidate` given `diagnostic`.
    pub async fn repair(&self, candidate: &str, diagnostic: &str) -> String {
        let Some(llm) = &self.llm else {
            warn!("LLM client not available for error fixing");
            return candidate.to_string();
        };

        let prompt = repair_prompt(candidate, diagnostic);
        match llm.complete(REPAIR_SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => {
                let fixed = strip_code_fences(&reply);
                info!(chars = fixed.len(), "LLM-generated schema fix");
                fixed
            }
            Err(e) => {
                error!(error = %e, "error fixing schema with LLM");
                candidate.to_string()
            }
        }
    }
}

impl std::fmt::Debug for SchemaRepairer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRepairer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
