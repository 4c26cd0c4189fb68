//! Chain execution: three dependent stages, stopping at the first failure.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{Instrument, debug, error, info, warn};

use testforge_config::Config;
use testforge_llm::{BackendAdapter, BackendFailure, BackendRequest, LlmBackend, LlmResult};
use testforge_prompt_template::{TargetLanguage, build_stage_prompt};
use testforge_utils::logging::{
    chain_span, log_stage_complete, log_stage_error, log_stage_start, stage_span,
};
use testforge_utils::types::StageId;

use crate::observer::{ProgressObserver, STATUS_COMPLETED, STATUS_FAILED};
use crate::result::{ChainResult, ChainResultBuilder, StageRecord};
use crate::state::ChainState;

/// Model and temperature overrides for one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSettings {
    /// `None` uses the backend default model.
    pub model: Option<String>,
    /// `None` uses the template's temperature.
    pub temperature: Option<f32>,
}

/// Everything about a run that is not the snippet or the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainSettings {
    pub language: TargetLanguage,
    stages: [StageSettings; 3],
}

impl ChainSettings {
    #[must_use]
    pub fn new(language: TargetLanguage) -> Self {
        Self {
            language,
            stages: Default::default(),
        }
    }

    /// Language and per-stage overrides from configuration.
    ///
    /// Stage models resolve `[stages.<stage>] model` before `[defaults] model`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut settings = Self::new(TargetLanguage::from_name(config.language()));
        for stage in StageId::ALL {
            settings.stages[stage.index()] = StageSettings {
                model: config.model_for_stage(stage),
                temperature: config.stage_temperature(stage),
            };
        }
        settings
    }

    #[must_use]
    pub fn with_stage_model(mut self, stage: StageId, model: impl Into<String>) -> Self {
        self.stages[stage.index()].model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_stage_temperature(mut self, stage: StageId, temperature: f32) -> Self {
        self.stages[stage.index()].temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn stage(&self, stage: StageId) -> &StageSettings {
        &self.stages[stage.index()]
    }
}

/// Why a stage did not produce output.
#[derive(Debug, Clone, Error)]
pub enum StageFailure {
    #[error("{0}")]
    Backend(#[from] BackendFailure),
    /// The backend task or the progress observer panicked.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
    #[error("chain cancelled")]
    Cancelled,
}

/// Drives a snippet through analysis, test-case design and test-code
/// generation.
///
/// Each stage's output is embedded in the next stage's prompt. The first
/// failure is recorded as one message in [`ChainResult::errors`] and no later
/// stage runs. Failures never escape [`run`](Self::run).
#[derive(Debug, Clone)]
pub struct ChainOrchestrator {
    adapter: BackendAdapter,
    settings: ChainSettings,
}

impl ChainOrchestrator {
    /// `stage_timeout` bounds each backend call.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, settings: ChainSettings, stage_timeout: Duration) -> Self {
        Self {
            adapter: BackendAdapter::new(backend, stage_timeout),
            settings,
        }
    }

    #[must_use]
    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &Config) -> Self {
        Self::new(
            backend,
            ChainSettings::from_config(config),
            config.stage_timeout(),
        )
    }

    #[must_use]
    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.adapter.provider_name()
    }

    /// Run the full chain for `snippet`.
    pub async fn run(&self, snippet: &str, observer: Option<&dyn ProgressObserver>) -> ChainResult {
        self.run_with_cancel(snippet, observer, CancellationToken::new())
            .await
    }

    /// Run the full chain, stopping early when `cancel` fires.
    ///
    /// Cancellation fails the in-flight stage (or the next one to start) with
    /// a "chain cancelled" message.
    pub async fn run_with_cancel(
        &self,
        snippet: &str,
        observer: Option<&dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> ChainResult {
        let span = chain_span(self.adapter.provider_name(), self.settings.language.name());
        self.drive(snippet, observer, &cancel).instrument(span).await
    }

    async fn drive(
        &self,
        snippet: &str,
        observer: Option<&dyn ProgressObserver>,
        cancel: &CancellationToken,
    ) -> ChainResult {
        let mut builder = ChainResultBuilder::new();
        let mut state = ChainState::Idle;
        let mut upstream = String::new();
        debug!(state = %state, snippet_bytes = snippet.len(), "Chain starting");

        for stage in StageId::ALL {
            state = ChainState::for_stage(stage);
            debug!(state = %state, "Chain state changed");

            let started = Instant::now();
            let outcome = match notify_observer(observer, stage, stage.progress_label()) {
                Err(message) => {
                    warn!(stage = %stage, panic = %message, "Progress observer panicked at stage start");
                    Err(StageFailure::Unexpected(format!(
                        "progress observer panicked: {message}"
                    )))
                }
                Ok(()) => {
                    let request = self.request_for(stage, snippet, &upstream);
                    let model = self.adapter.effective_model(&request);
                    let provider = self.adapter.provider_name().to_string();
                    async {
                        log_stage_start(stage.as_str(), &provider);
                        self.execute_stage(request, cancel).await
                    }
                    .instrument(stage_span(stage.as_str(), &provider, &model))
                    .await
                }
            };
            let elapsed = started.elapsed();

            let recorded = match outcome {
                Ok(result) => {
                    log_stage_complete(stage.as_str(), elapsed.as_millis(), result.raw_response.len());
                    let record = StageRecord::from_llm_result(stage, &result);
                    upstream.clone_from(&result.raw_response);
                    builder.record_output(stage, result.raw_response, record)
                }
                Err(failure) => {
                    let message = format!("{}: {failure}", stage.failure_label());
                    log_stage_error(stage.as_str(), &message, elapsed.as_millis());
                    state = ChainState::Failed;
                    builder.record_failure(stage, message)
                }
            };

            if let Err(e) = recorded {
                error!(stage = %stage, error = %e, "Chain result rejected stage outcome");
                let failure = StageFailure::Unexpected(e.to_string());
                builder.ensure_failed(format!("{}: {failure}", stage.failure_label()));
                state = ChainState::Failed;
            }

            let status = if state == ChainState::Failed {
                STATUS_FAILED
            } else {
                STATUS_COMPLETED
            };
            if let Err(message) = notify_observer(observer, stage, status) {
                warn!(
                    stage = %stage,
                    status,
                    panic = %message,
                    "Progress observer panicked, notification dropped"
                );
            }
            if state == ChainState::Failed {
                break;
            }
        }

        if state != ChainState::Failed {
            state = ChainState::Done;
        }

        let result = builder.finalize();
        info!(
            state = %state,
            stages_completed = result.stages.len(),
            errors = result.errors.len(),
            "Chain finished"
        );
        result
    }

    fn request_for(&self, stage: StageId, snippet: &str, upstream: &str) -> BackendRequest {
        let overrides = self.settings.stage(stage);
        let mut prompt = build_stage_prompt(stage, snippet, upstream, &self.settings.language);
        if let Some(temperature) = overrides.temperature {
            prompt = prompt.with_temperature(temperature);
        }
        BackendRequest::new(stage, prompt.system, prompt.user, prompt.temperature)
            .with_model(overrides.model.clone())
    }

    /// One backend call on its own task, so a panic in the backend or a
    /// cancellation only ends this stage.
    async fn execute_stage(
        &self,
        request: BackendRequest,
        cancel: &CancellationToken,
    ) -> Result<LlmResult, StageFailure> {
        if cancel.is_cancelled() {
            return Err(StageFailure::Cancelled);
        }

        // Dropping the handle aborts the call, including when the caller drops
        // the chain future.
        let adapter = self.adapter.clone();
        let mut handle = AbortOnDropHandle::new(tokio::spawn(
            async move { adapter.generate(&request).await }.in_current_span(),
        ));

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(StageFailure::Cancelled),
            joined = &mut handle => match joined {
                Ok(outcome) => outcome.map_err(StageFailure::from),
                Err(e) if e.is_panic() => Err(StageFailure::Unexpected(panic_message(e.into_panic()))),
                Err(e) => Err(StageFailure::Unexpected(e.to_string())),
            },
        }
    }
}

/// Deliver one notification, containing a panic raised by the observer.
fn notify_observer(
    observer: Option<&dyn ProgressObserver>,
    stage: StageId,
    status: &str,
) -> Result<(), String> {
    let Some(observer) = observer else {
        return Ok(());
    };
    panic::catch_unwind(AssertUnwindSafe(|| observer.notify(stage, status))).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "backend panicked".to_string()
    }
}
