//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemorySchemaStore`, `ScriptedLlm`, `StalledLlm`, and
//! `ScriptedValidator` that satisfy the trait contracts without touching the
//! filesystem, the network, or external processes.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::store::{Result as StoreResult, SchemaStore};
use crate::validator::{CheckReport, SchemaValidator};

// ---------------------------------------------------------------------------
// MemorySchemaStore
// ---------------------------------------------------------------------------

/// Schema store backed by a `String`.
#[derive(Debug)]
pub struct MemorySchemaStore {
    content: Mutex<String>,
    writes: Mutex<Vec<String>>,
    path: PathBuf,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self {
            content: Mutex::new(String::new()),
            writes: Mutex::new(Vec::new()),
            path: PathBuf::from("memory/schema.prisma"),
        }
    }

    /// Every value passed to `write`, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl Default for MemorySchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaStore for MemorySchemaStore {
    fn read(&self) -> StoreResult<String> {
        Ok(self.content.lock().unwrap().clone())
    }

    fn write(&self, content: &str) -> StoreResult<()> {
        *self.content.lock().unwrap() = content.to_string();
        self.writes.lock().unwrap().push(content.to_string());
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// ScriptedLlm
// ---------------------------------------------------------------------------

/// One recorded `complete` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmCall {
    pub system: String,
    pub user: String,
}

/// LLM that replays scripted replies in order and records every call.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<LlmCall>>,
}

impl ScriptedLlm {
    /// Replay `replies` in order; further calls fail with a transport error.
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(LlmCall {
            system: system.to_string(),
            user: user.to_string(),
        });

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(reply) => Ok(reply.clone()),
            None => Err(LlmError::Transport("no scripted reply left".to_string())),
        }
    }
}

/// LLM whose requests never complete, like a server that accepts the
/// connection and never answers.
#[derive(Debug, Default)]
pub struct StalledLlm;

#[async_trait]
impl LlmClient for StalledLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// ScriptedValidator
// ---------------------------------------------------------------------------

/// Validator that replays scripted reports and records checked candidates.
///
/// Once the script runs out, the last report repeats.
#[derive(Debug)]
pub struct ScriptedValidator {
    reports: Mutex<VecDeque<CheckReport>>,
    last: Mutex<CheckReport>,
    checked: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub fn new(reports: Vec<CheckReport>) -> Self {
        let last = reports.last().cloned().unwrap_or_else(CheckReport::pass);
        Self {
            reports: Mutex::new(reports.into()),
            last: Mutex::new(last),
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn always(report: CheckReport) -> Self {
        Self::new(vec![report])
    }

    /// Candidates passed to `check`, in order.
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }

    pub fn check_count(&self) -> usize {
        self.checked.lock().unwrap().len()
    }
}

#[async_trait]
impl SchemaValidator for ScriptedValidator {
    async fn check(&self, candidate: &str) -> CheckReport {
        self.checked.lock().unwrap().push(candidate.to_string());
        match self.reports.lock().unwrap().pop_front() {
            Some(report) => {
                *self.last.lock().unwrap() = report.clone();
                report
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::CheckFailure;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySchemaStore::new();
        assert_eq!(store.read().unwrap(), "");
        store.write("model A {}").unwrap();
        assert_eq!(store.read().unwrap(), "model A {}");
        assert_eq!(store.writes(), vec!["model A {}".to_string()]);
    }

    #[tokio::test]
    async fn scripted_llm_replays_then_fails() {
        let llm = ScriptedLlm::new(vec![Ok("one".to_string())]);
        assert_eq!(llm.complete("s", "u").await.unwrap(), "one");
        assert!(llm.complete("s", "u").await.is_err());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn scripted_validator_repeats_last_report() {
        let validator = ScriptedValidator::new(vec![
            CheckReport::fail(CheckFailure::Rejected, "bad"),
            CheckReport::pass(),
        ]);
        assert!(!validator.check("a").await.passed);
        assert!(validator.check("b").await.passed);
        assert!(validator.check("c").await.passed);
        assert_eq!(validator.checked(), vec!["a", "b", "c"]);
    }
}
