//! Chain result and its write-once builder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use testforge_llm::LlmResult;
use testforge_utils::types::StageId;

use crate::state::ChainState;

/// Metadata about one successful stage.
///
/// Holds nothing time-dependent, so a deterministic backend yields identical
/// results across runs. Durations are reported through tracing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_input: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_output: Option<u64>,
}

impl StageRecord {
    #[must_use]
    pub fn from_llm_result(stage: StageId, result: &LlmResult) -> Self {
        Self {
            stage,
            provider: result.provider.clone(),
            model: result.model_used.clone(),
            tokens_input: result.tokens_input,
            tokens_output: result.tokens_output,
        }
    }
}

/// Outcome of one chain run.
///
/// Outputs are filled strictly in stage order. `errors` is empty exactly when
/// all three outputs are present; otherwise it holds a single message and
/// every output after the failing stage is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResult {
    pub analysis: Option<String>,
    pub test_cases: Option<String>,
    pub test_code: Option<String>,
    pub errors: Vec<String>,
    /// One entry per successful stage.
    #[serde(default)]
    pub stages: Vec<StageRecord>,
}

impl ChainResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Output of `stage`, if it ran successfully.
    #[must_use]
    pub fn output(&self, stage: StageId) -> Option<&str> {
        match stage {
            StageId::Analysis => self.analysis.as_deref(),
            StageId::TestCases => self.test_cases.as_deref(),
            StageId::TestCode => self.test_code.as_deref(),
        }
    }

    /// The stage that stopped the chain.
    #[must_use]
    pub fn failed_stage(&self) -> Option<StageId> {
        if self.errors.is_empty() {
            return None;
        }
        StageId::ALL
            .into_iter()
            .find(|stage| self.output(*stage).is_none())
    }

    #[must_use]
    pub fn final_state(&self) -> ChainState {
        if self.is_success() {
            ChainState::Done
        } else {
            ChainState::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ResultError {
    #[error("chain already failed; refusing to record {0}")]
    AlreadyFailed(StageId),
    #[error("stage {got} recorded out of order (expected {expected:?})")]
    OutOfOrder {
        expected: Option<StageId>,
        got: StageId,
    },
}

/// Single writer for a [`ChainResult`].
///
/// Accepts outputs only for the next stage in order, and nothing at all once
/// a failure was recorded.
#[derive(Debug, Default)]
pub(crate) struct ChainResultBuilder {
    result: ChainResult,
    next: usize,
    failed: bool,
}

impl ChainResultBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn check(&self, stage: StageId) -> Result<(), ResultError> {
        if self.failed {
            return Err(ResultError::AlreadyFailed(stage));
        }
        if stage.index() != self.next {
            return Err(ResultError::OutOfOrder {
                expected: StageId::ALL.get(self.next).copied(),
                got: stage,
            });
        }
        Ok(())
    }

    pub(crate) fn record_output(
        &mut self,
        stage: StageId,
        text: String,
        record: StageRecord,
    ) -> Result<(), ResultError> {
        self.check(stage)?;
        let slot = match stage {
            StageId::Analysis => &mut self.result.analysis,
            StageId::TestCases => &mut self.result.test_cases,
            StageId::TestCode => &mut self.result.test_code,
        };
        *slot = Some(text);
        self.result.stages.push(record);
        self.next += 1;
        Ok(())
    }

    pub(crate) fn record_failure(
        &mut self,
        stage: StageId,
        message: String,
    ) -> Result<(), ResultError> {
        self.check(stage)?;
        self.result.errors.push(message);
        self.failed = true;
        Ok(())
    }

    /// Mark the result failed, adding `message` only when no error is recorded
    /// yet, so a failed result always carries exactly one error.
    pub(crate) fn ensure_failed(&mut self, message: String) {
        if self.result.errors.is_empty() {
            self.result.errors.push(message);
        }
        self.failed = true;
    }

    pub(crate) fn finalize(self) -> ChainResult {
        self.result
    }
}
