//! Progress reporting for chain runs.
//!
//! Observers are passive: the orchestrator never reads anything back from
//! them, and a failing observer cannot change the outcome of a run.

use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use testforge_utils::types::StageId;

/// Status text sent after a stage produced its output.
pub const STATUS_COMPLETED: &str = "completed";
/// Status text sent after a stage failed.
pub const STATUS_FAILED: &str = "failed";

/// Sink for stage transitions.
///
/// On entering a stage the observer receives the stage's progress label
/// (see [`StageId::progress_label`]); on leaving it, [`STATUS_COMPLETED`] or
/// [`STATUS_FAILED`].
///
/// Any `Fn(StageId, &str)` closure is an observer:
///
/// ```rust
/// use testforge_orchestrator::ProgressObserver;
/// use testforge_utils::types::StageId;
///
/// let print = |stage: StageId, status: &str| eprintln!("[{stage}] {status}");
/// print.notify(StageId::Analysis, "Analyzing source code");
/// ```
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, stage: StageId, status: &str);
}

impl<F> ProgressObserver for F
where
    F: Fn(StageId, &str) + Send + Sync,
{
    fn notify(&self, stage: StageId, status: &str) {
        self(stage, status);
    }
}

/// One observed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub stage: StageId,
    pub status: String,
}

/// Forwards every transition onto an unbounded channel.
///
/// Sends to a dropped receiver are ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<ProgressUpdate>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new(tx: UnboundedSender<ProgressUpdate>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of a fresh channel.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn notify(&self, stage: StageId, status: &str) {
        let _ = self.tx.send(ProgressUpdate {
            stage,
            status: status.to_string(),
        });
    }
}

/// Observer that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn notify(&self, _stage: StageId, _status: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_is_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |stage: StageId, status: &str| {
            seen.lock().unwrap().push((stage, status.to_string()));
        };
        observer.notify(StageId::TestCode, "completed");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(StageId::TestCode, "completed".to_string())]
        );
    }

    #[test]
    fn test_channel_observer_forwards_updates() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.notify(StageId::Analysis, "Analyzing source code");
        observer.notify(StageId::Analysis, STATUS_COMPLETED);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.stage, StageId::Analysis);
        assert_eq!(first.status, "Analyzing source code");
        assert_eq!(rx.try_recv().unwrap().status, STATUS_COMPLETED);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        observer.notify(StageId::TestCases, STATUS_FAILED);
    }
}
