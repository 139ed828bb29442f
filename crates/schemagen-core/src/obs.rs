//! Structured observability hooks for validation runs.
//!
//! This module provides:
//! - A run-scoped tracing span via [`validation_span`]
//! - Emission functions for loop lifecycle events: start, attempt, repair, finish
//!
//! Verbosity follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

use crate::validator::CheckFailure;

/// Run-scoped span for one validation loop.
///
/// Attach it to the loop future with `tracing::Instrument` so the span is
/// entered only while the future is polled:
///
/// ```ignore
/// run_loop().instrument(validation_span(&run_id)).await
/// ```
pub fn validation_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("schemagen.validation", run_id = %run_id)
}

/// Emit event: validation loop started.
pub fn emit_validation_started(run_id: &str, max_attempts: u32, schema_chars: usize) {
    info!(
        event = "validation.started",
        run_id = %run_id,
        max_attempts = max_attempts,
        schema_chars = schema_chars,
    );
}

/// Emit event: one attempt is about to call the validator.
pub fn emit_attempt_started(attempt: u32, max_attempts: u32) {
    info!(
        event = "validation.attempt",
        attempt = attempt,
        max_attempts = max_attempts,
        "Validating schema (attempt {attempt}/{max_attempts})"
    );
}

/// Emit event: an attempt failed (warning level).
pub fn emit_attempt_failed(attempt: u32, failure: Option<CheckFailure>, diagnostic: &str) {
    warn!(
        event = "validation.attempt_failed",
        attempt = attempt,
        failure = ?failure,
        diagnostic = %diagnostic,
    );
}

/// Emit event: a repair is being requested after a failed attempt.
pub fn emit_repair_requested(attempt: u32) {
    info!(
        event = "validation.repair_requested",
        attempt = attempt,
        "Validation failed, attempting to fix with LLM (attempt {attempt})"
    );
}

/// Emit event: validation loop finished.
pub fn emit_validation_finished(run_id: &str, success: bool, attempts: u32, duration_ms: u64) {
    if success {
        info!(
            event = "validation.finished",
            run_id = %run_id,
            success = true,
            attempts = attempts,
            duration_ms = duration_ms,
        );
    } else {
        warn!(
            event = "validation.finished",
            run_id = %run_id,
            success = false,
            attempts = attempts,
            duration_ms = duration_ms,
            "Schema validation failed after {attempts} attempts"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_attempt_started_logs_progress() {
        emit_attempt_started(2, 3);
        assert!(logs_contain("attempt 2/3"));
    }

    #[traced_test]
    #[test]
    fn test_attempt_failed_logs_diagnostic() {
        emit_attempt_failed(1, Some(CheckFailure::Rejected), "missing id field");
        assert!(logs_contain("validation.attempt_failed"));
        assert!(logs_contain("missing id field"));
    }

    #[traced_test]
    #[test]
    fn test_finished_failure_logs_attempts() {
        emit_validation_finished("run-1", false, 3, 10);
        assert!(logs_contain("failed after 3 attempts"));
    }

    #[traced_test]
    #[test]
    fn test_span_carries_run_id() {
        let _entered = validation_span("run-span-1").entered();
        emit_repair_requested(1);
        assert!(logs_contain("run-span-1"));
    }
}
