//! Scripted backend for tests.
//!
//! Replies are consumed in order, one per invocation, and every invocation is
//! recorded so tests can inspect the prompts that were sent.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};

type Responder = dyn Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync;

/// One scripted reaction to an invocation.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Succeed with this text.
    Text(String),
    /// Fail with this error.
    Fail(LlmError),
    /// Panic inside the backend.
    Panic(String),
    /// Never answer.
    Hang,
    /// Succeed with the text after a delay.
    Delayed(Duration, String),
}

pub struct ScriptedBackend {
    provider: String,
    default_model: String,
    replies: Mutex<VecDeque<ScriptedReply>>,
    responder: Option<Box<Responder>>,
    calls: Mutex<Vec<LlmInvocation>>,
}

impl std::fmt::Debug for ScriptedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedBackend")
            .field("provider", &self.provider)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: "scripted".to_string(),
            default_model: "scripted-model".to_string(),
            replies: Mutex::new(VecDeque::new()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend answering every invocation through `f`.
    #[must_use]
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(f)),
            ..Self::new()
        }
    }

    /// Backend returning the given texts in order.
    #[must_use]
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for text in texts {
            backend.push(ScriptedReply::Text(text.into()));
        }
        backend
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    #[must_use]
    pub fn then(self, reply: ScriptedReply) -> Self {
        self.push(reply);
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(reply);
    }

    /// Every invocation received so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<LlmInvocation> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn model_for(&self, inv: &LlmInvocation) -> String {
        if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = self.model_for(&inv);
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(inv.clone());

        if let Some(responder) = &self.responder {
            return responder(&inv).map(|text| LlmResult::new(text, &self.provider, model));
        }

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(ScriptedReply::Text(text)) => Ok(LlmResult::new(text, &self.provider, model)),
            Some(ScriptedReply::Fail(err)) => Err(err),
            Some(ScriptedReply::Panic(msg)) => panic!("{msg}"),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(LlmResult::new(text, &self.provider, model))
            }
            None => Err(LlmError::Misconfiguration(
                "scripted backend has no reply left".to_string(),
            )),
        }
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
