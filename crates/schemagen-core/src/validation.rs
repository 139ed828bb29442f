//! Bounded validate-and-repair loop.
//!
//! [`ValidationLoop::validate`] runs up to `max_attempts` validator checks.
//! Between failed checks it asks the [`SchemaRepairer`] for a corrected
//! candidate. A candidate that differs from the input is persisted only once
//! it passes.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::obs::{
    emit_attempt_failed, emit_attempt_started, emit_repair_requested, emit_validation_finished,
    emit_validation_started, validation_span,
};
use crate::repair::SchemaRepairer;
use crate::store::{Result, SchemaStore};
use crate::validator::{CheckFailure, CheckReport, SchemaValidator};

/// Diagnostic returned for an empty input schema.
pub const EMPTY_SCHEMA_DIAGNOSTIC: &str = "Schema content is empty";

/// Default attempt bound.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a validation run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The input schema was empty; no attempt was made.
    EmptyInput,
    /// The last validator check failed.
    Validator(CheckFailure),
}

/// Terminal result of one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The schema passed validation.
    Passed { schema: String, attempts: u32 },

    /// Attempts were exhausted, no repair was possible, or the input was empty.
    Failed {
        schema: String,
        diagnostic: String,
        attempts: u32,
        reason: FailureReason,
    },
}

impl ValidationOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ValidationOutcome::Passed { .. })
    }

    /// Final candidate: the accepted schema, or the last one tried.
    pub fn schema(&self) -> &str {
        match self {
            ValidationOutcome::Passed { schema, .. } | ValidationOutcome::Failed { schema, .. } => {
                schema
            }
        }
    }

    /// Failure diagnostic; empty on success.
    pub fn diagnostic(&self) -> &str {
        match self {
            ValidationOutcome::Passed { .. } => "",
            ValidationOutcome::Failed { diagnostic, .. } => diagnostic,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ValidationOutcome::Passed { attempts, .. }
            | ValidationOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            ValidationOutcome::Passed { .. } => None,
            ValidationOutcome::Failed { reason, .. } => Some(*reason),
        }
    }

    fn empty_input() -> Self {
        ValidationOutcome::Failed {
            schema: String::new(),
            diagnostic: EMPTY_SCHEMA_DIAGNOSTIC.to_string(),
            attempts: 0,
            reason: FailureReason::EmptyInput,
        }
    }
}

/// One iteration of the loop: the candidate checked and what the validator said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationAttempt {
    pub number: u32,
    pub candidate: String,
    pub report: CheckReport,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Validate-and-repair orchestrator.
#[derive(Clone)]
pub struct ValidationLoop {
    validator: Arc<dyn SchemaValidator>,
    repairer: SchemaRepairer,
    store: Arc<dyn SchemaStore>,
}

impl ValidationLoop {
    pub fn new(
        validator: Arc<dyn SchemaValidator>,
        repairer: SchemaRepairer,
        store: Arc<dyn SchemaStore>,
    ) -> Self {
        Self {
            validator,
            repairer,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SchemaStore> {
        &self.store
    }

    pub fn repairer(&self) -> &SchemaRepairer {
        &self.repairer
    }

    /// Validate `initial`, repairing between attempts, at most `max_attempts`
    /// validator calls. `max_attempts = 0` is treated as 1.
    ///
    /// Only a storage failure while persisting an accepted, repaired schema
    /// is an error; every validator or LLM problem ends up in the outcome.
    pub async fn validate(&self, initial: &str, max_attempts: u32) -> Result<ValidationOutcome> {
        if initial.is_empty() {
            return Ok(ValidationOutcome::empty_input());
        }

        let max_attempts = if max_attempts == 0 {
            warn!("max_attempts must be at least 1; using 1");
            1
        } else {
            max_attempts
        };

        let run_id = Uuid::new_v4().to_string();
        self.run_loop(&run_id, initial, max_attempts)
            .instrument(validation_span(&run_id))
            .await
    }

    async fn run_loop(
        &self,
        run_id: &str,
        initial: &str,
        max_attempts: u32,
    ) -> Result<ValidationOutcome> {
        let start = Instant::now();
        emit_validation_started(run_id, max_attempts, initial.len());

        let mut current = initial.to_string();
        let mut attempt = 0u32;
        let mut last: Option<ValidationAttempt> = None;

        while attempt < max_attempts {
            attempt += 1;
            emit_attempt_started(attempt, max_attempts);

            let report = self.validator.check(&current).await;

            if report.passed {
                if current != initial {
                    self.store.write(&current)?;
                }
                emit_validation_finished(run_id, true, attempt, elapsed_ms(start));
                return Ok(ValidationOutcome::Passed {
                    schema: current,
                    attempts: attempt,
                });
            }

            emit_attempt_failed(attempt, report.failure, &report.diagnostic);
            let can_repair = attempt < max_attempts && self.repairer.is_enabled();
            let checked = ValidationAttempt {
                number: attempt,
                candidate: current.clone(),
                report,
            };

            if !can_repair {
                last = Some(checked);
                break;
            }

            emit_repair_requested(attempt);
            current = self
                .repairer
                .repair(&checked.candidate, &checked.report.diagnostic)
                .await;
            last = Some(checked);
        }

        emit_validation_finished(run_id, false, attempt, elapsed_ms(start));

        // `max_attempts >= 1`, so at least one attempt has been recorded.
        let (diagnostic, failure) = match last {
            Some(a) => (
                a.report.diagnostic,
                a.report.failure.unwrap_or(CheckFailure::Rejected),
            ),
            None => (String::new(), CheckFailure::Rejected),
        };

        Ok(ValidationOutcome::Failed {
            schema: current,
            diagnostic,
            attempts: attempt,
            reason: FailureReason::Validator(failure),
        })
    }
}

impl std::fmt::Debug for ValidationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationLoop")
            .field("repairer", &self.repairer)
            .field("store", &self.store.path())
            .finish()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
