//! External schema validator adapter.
//!
//! Defines the [`SchemaValidator`] trait and [`PrismaValidator`], which runs
//! `prisma validate --schema=<path>` against a scratch copy of the candidate.
//! Candidates are checked from a separate scratch file so a previously accepted
//! schema is never clobbered by an unvalidated candidate.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Fallback diagnostic when the validator fails silently.
pub const UNKNOWN_VALIDATION_ERROR: &str = "Unknown validation error";

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a check did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFailure {
    /// The validator ran and rejected the schema.
    Rejected,
    /// The validator executable could not be found.
    ToolMissing,
    /// The validator did not finish within the configured bound.
    TimedOut,
    /// Any other error launching or talking to the validator.
    LaunchFailed,
}

/// Outcome of one validator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub passed: bool,

    /// Validator output explaining the failure; empty when `passed`.
    pub diagnostic: String,

    /// Failure kind; `None` when `passed`.
    pub failure: Option<CheckFailure>,
}

impl CheckReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostic: String::new(),
            failure: None,
        }
    }

    pub fn fail(failure: CheckFailure, diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: diagnostic.into(),
            failure: Some(failure),
        }
    }
}

// ---------------------------------------------------------------------------
// Validator trait
// ---------------------------------------------------------------------------

/// Checks a candidate schema. Never errors: every problem, including a
/// missing or crashing validator, is reported as a failed [`CheckReport`].
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn check(&self, candidate: &str) -> CheckReport;
}

// ---------------------------------------------------------------------------
// Prisma CLI validator
// ---------------------------------------------------------------------------

/// Configuration for the Prisma CLI validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorConfig {
    /// Path to (or name of) the validator binary.
    pub binary_path: String,

    /// Arguments placed before `--schema=<path>`.
    pub args: Vec<String>,

    /// Directory for scratch candidate files.
    pub scratch_dir: PathBuf,

    /// Timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            binary_path: "prisma".to_string(),
            args: vec!["validate".to_string()],
            scratch_dir: PathBuf::from(crate::store::DEFAULT_SCHEMA_DIR),
            timeout_secs: 60,
        }
    }
}

/// Internal failure modes of a validator run, rendered into diagnostics.
#[derive(Debug, Error)]
enum RunError {
    #[error(
        "Prisma CLI not found. Please install Prisma:\n  Python: pip install prisma\n  Node.js: npm install -g prisma"
    )]
    ToolMissing,

    #[error("prisma validate timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Error running prisma validate: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    fn failure(&self) -> CheckFailure {
        match self {
            RunError::ToolMissing => CheckFailure::ToolMissing,
            RunError::Timeout { .. } => CheckFailure::TimedOut,
            RunError::Io(_) => CheckFailure::LaunchFailed,
        }
    }
}

/// Runs the Prisma CLI (or a compatible checker) against candidate schemas.
#[derive(Debug, Clone)]
pub struct PrismaValidator {
    config: ValidatorConfig,
}

impl PrismaValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    async fn run(&self, candidate: &str) -> Result<CheckReport, RunError> {
        std::fs::create_dir_all(&self.config.scratch_dir)?;

        // Removed on drop, on every path out of this function.
        let mut scratch = tempfile::Builder::new()
            .prefix("candidate-")
            .suffix(".prisma")
            .tempfile_in(&self.config.scratch_dir)?;
        scratch.write_all(candidate.as_bytes())?;
        scratch.flush()?;
        let schema_path = scratch.path().canonicalize()?;

        let start = Instant::now();
        let child = Command::new(&self.config.binary_path)
            .args(&self.config.args)
            .arg(format!("--schema={}", schema_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    warn!(binary = %self.config.binary_path, "validator executable not found");
                    RunError::ToolMissing
                } else {
                    RunError::Io(e)
                }
            })?;

        let output = if self.config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| RunError::Timeout {
                secs: self.config.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        debug!(
            binary = %self.config.binary_path,
            exit_code = output.status.code().unwrap_or(-1),
            duration_ms = start.elapsed().as_millis() as u64,
            "validator finished"
        );

        if output.status.success() {
            return Ok(CheckReport::pass());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(CheckReport::fail(
            CheckFailure::Rejected,
            select_diagnostic(&stdout, &stderr),
        ))
    }
}

impl Default for PrismaValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

#[async_trait]
impl SchemaValidator for PrismaValidator {
    async fn check(&self, candidate: &str) -> CheckReport {
        let report = match self.run(candidate).await {
            Ok(report) => report,
            Err(e) => CheckReport::fail(e.failure(), e.to_string()),
        };

        if report.passed {
            info!("schema validation passed");
        } else {
            error!(failure = ?report.failure, diagnostic = %report.diagnostic, "schema validation failed");
        }
        report
    }
}

/// Pick the validator's diagnostic: stderr, then stdout, then a generic message.
///
/// A stream holding only whitespace counts as empty, so a blank stderr falls
/// back to stdout instead of yielding an unreadable diagnostic.
pub fn select_diagnostic(stdout: &str, stderr: &str) -> String {
    if !stderr.trim().is_empty() {
        stderr.to_string()
    } else if !stdout.trim().is_empty() {
        stdout.to_string()
    } else {
        UNKNOWN_VALIDATION_ERROR.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_validator(script: &str, scratch_dir: PathBuf) -> PrismaValidator {
        PrismaValidator::new(ValidatorConfig {
            binary_path: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            scratch_dir,
            timeout_secs: 30,
        })
    }

    #[test]
    fn test_validator_config_default() {
        let config = ValidatorConfig::default();
        assert_eq!(config.binary_path, "prisma");
        assert_eq!(config.args, vec!["validate".to_string()]);
        assert_eq!(config.scratch_dir, PathBuf::from("prisma"));
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_select_diagnostic_prefers_stderr() {
        assert_eq!(select_diagnostic("out", "err"), "err");
        assert_eq!(select_diagnostic("out", ""), "out");
        assert_eq!(select_diagnostic("out", "  \n"), "out");
        assert_eq!(select_diagnostic("", ""), UNKNOWN_VALIDATION_ERROR);
    }

    #[test]
    fn test_check_report_constructors() {
        let pass = CheckReport::pass();
        assert!(pass.passed);
        assert!(pass.diagnostic.is_empty());
        assert!(pass.failure.is_none());

        let fail = CheckReport::fail(CheckFailure::Rejected, "bad field");
        assert!(!fail.passed);
        assert_eq!(fail.diagnostic, "bad field");
        assert_eq!(fail.failure, Some(CheckFailure::Rejected));
    }

    #[test]
    fn test_run_error_diagnostics_are_stable() {
        assert_eq!(
            RunError::ToolMissing.to_string(),
            "Prisma CLI not found. Please install Prisma:\n  Python: pip install prisma\n  Node.js: npm install -g prisma"
        );
        assert_eq!(
            RunError::Timeout { secs: 60 }.to_string(),
            "prisma validate timed out after 60s"
        );
    }

    #[tokio::test]
    async fn test_zero_exit_passes() {
        let dir = tempfile::tempdir().unwrap();
        let validator = sh_validator("exit 0", dir.path().to_path_buf());
        let report = validator.check("model A {}").await;
        assert_eq!(report, CheckReport::pass());
    }

    #[tokio::test]
    async fn test_silent_failure_uses_generic_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let validator = sh_validator("exit 1", dir.path().to_path_buf());
        let report = validator.check("model A {}").await;
        assert!(!report.passed);
        assert_eq!(report.diagnostic, UNKNOWN_VALIDATION_ERROR);
        assert_eq!(report.failure, Some(CheckFailure::Rejected));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut validator = sh_validator("sleep 5", dir.path().to_path_buf());
        validator.config.timeout_secs = 1;
        let report = validator.check("model A {}").await;
        assert!(!report.passed);
        assert_eq!(report.failure, Some(CheckFailure::TimedOut));
        assert_eq!(report.diagnostic, "prisma validate timed out after 1s");
    }
}
