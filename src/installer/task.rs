//! Background install/remove tasks.
//!
//! Each request runs as one tokio task that walks through [`TaskState`]s and
//! ends in exactly one terminal state. The terminal state is reported once
//! to the task's [`ProgressSink`] (`error` if it failed, then `finished`).

use anyhow::Result;
use log::{debug, warn};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::InstallError;
use crate::http::NonRetryableError;
use crate::progress::ProgressSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Downloading,
    Extracting,
    Discovering,
    Validating,
    Committing,
    Done,
    Canceled,
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Canceled | TaskState::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "Pending",
            TaskState::Downloading => "Downloading",
            TaskState::Extracting => "Extracting",
            TaskState::Discovering => "Looking for the contribution",
            TaskState::Validating => "Writing contribution properties",
            TaskState::Committing => "Installing",
            TaskState::Done => "Done",
            TaskState::Canceled => "Canceled",
            TaskState::Error => "Error",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a task ended.
#[derive(Debug)]
pub enum TaskOutcome {
    Done,
    Canceled,
    Failed(anyhow::Error),
}

impl TaskOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done)
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            TaskOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// The typed reason of a failure, if it has one.
    pub fn install_error(&self) -> Option<&InstallError> {
        self.error().and_then(|e| e.downcast_ref::<InstallError>())
    }

    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Done => TaskState::Done,
            TaskOutcome::Canceled => TaskState::Canceled,
            TaskOutcome::Failed(_) => TaskState::Error,
        }
    }
}

/// The running side of a task: moves it between states and reports the end.
#[derive(Clone)]
pub(crate) struct TaskReporter {
    state: Arc<watch::Sender<TaskState>>,
    progress: Arc<dyn ProgressSink>,
}

impl TaskReporter {
    pub(crate) fn progress(&self) -> &Arc<dyn ProgressSink> {
        &self.progress
    }

    pub(crate) fn enter(&self, state: TaskState) {
        debug!("Task state: {}", state);
        self.state.send_replace(state);
        self.progress.start_task(state.label(), None);
    }

    /// Fails with [`InstallError::Canceled`] once cancellation was requested.
    pub(crate) fn check_canceled(&self) -> Result<()> {
        if self.progress.is_canceled() {
            return Err(InstallError::Canceled.into());
        }
        Ok(())
    }

    fn finish(&self, result: Result<()>) -> TaskOutcome {
        let outcome = match result {
            Ok(()) => TaskOutcome::Done,
            Err(e) if is_cancellation(&e) => TaskOutcome::Canceled,
            Err(e) => {
                warn!("{:#}", e);
                self.progress.error(&format!("{:#}", e));
                TaskOutcome::Failed(e)
            }
        };
        self.state.send_replace(outcome.state());
        self.progress.finished();
        outcome
    }
}

fn is_cancellation(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<InstallError>(), Some(InstallError::Canceled))
        || matches!(
            e.downcast_ref::<NonRetryableError>(),
            Some(NonRetryableError::Canceled)
        )
}

/// Handle to a spawned task.
pub struct TaskHandle {
    progress: Arc<dyn ProgressSink>,
    state: watch::Receiver<TaskState>,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    /// Run `work` on the tokio runtime.
    pub(crate) fn spawn<F, Fut>(progress: Arc<dyn ProgressSink>, work: F) -> Self
    where
        F: FnOnce(TaskReporter) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(TaskState::Pending);
        let reporter = TaskReporter {
            state: Arc::new(tx),
            progress: Arc::clone(&progress),
        };
        let finisher = reporter.clone();
        let fut = work(reporter);
        let join = tokio::spawn(async move { finisher.finish(fut.await) });

        Self {
            progress,
            state: rx,
            join,
        }
    }

    /// Ask the task to stop. Honored up to the commit step.
    pub fn cancel(&self) {
        self.progress.cancel();
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<TaskState> {
        self.state.clone()
    }

    pub fn progress(&self) -> &Arc<dyn ProgressSink> {
        &self.progress
    }

    /// Wait for the task to end.
    pub async fn wait(self) -> TaskOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The task never reached its own report
                let message = format!("Task aborted: {}", e);
                self.progress.error(&message);
                self.progress.finished();
                TaskOutcome::Failed(anyhow::anyhow!(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{MockProgressSink, ProgressMonitor};
    use mockall::predicate::always;

    #[tokio::test]
    async fn test_successful_task() {
        let progress = Arc::new(ProgressMonitor::new());
        let handle = TaskHandle::spawn(progress.clone(), |reporter| async move {
            reporter.enter(TaskState::Downloading);
            reporter.enter(TaskState::Committing);
            anyhow::Ok(())
        });

        let outcome = handle.wait().await;
        assert!(outcome.is_done());
        assert!(progress.is_finished());
        assert!(!progress.is_error());
    }

    #[tokio::test]
    async fn test_failed_task_reports_error_once() {
        let mut progress = MockProgressSink::new();
        progress.expect_start_task().returning(|_, _| ());
        progress.expect_is_canceled().returning(|| false);
        progress.expect_error().with(always()).times(1).returning(|_| ());
        progress.expect_finished().times(1).returning(|| ());

        let handle = TaskHandle::spawn(Arc::new(progress), |reporter| async move {
            reporter.enter(TaskState::Discovering);
            let result: Result<()> = Err(InstallError::AmbiguousArchive(2).into());
            result
        });

        let outcome = handle.wait().await;
        assert_eq!(outcome.state(), TaskState::Error);
        assert_eq!(outcome.install_error(), Some(&InstallError::AmbiguousArchive(2)));
    }

    #[tokio::test]
    async fn test_canceled_task() {
        let progress = Arc::new(ProgressMonitor::new());
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = TaskHandle::spawn(progress.clone(), |reporter| async move {
            let _ = go_rx.await;
            reporter.check_canceled()?;
            reporter.enter(TaskState::Committing);
            anyhow::Ok(())
        });

        handle.cancel();
        go_tx.send(()).unwrap();
        let mut state = handle.watch_state();

        let outcome = handle.wait().await;
        assert!(matches!(outcome, TaskOutcome::Canceled));
        assert_eq!(*state.borrow_and_update(), TaskState::Canceled);
        assert!(progress.is_finished());
        // Cancellation is not an error
        assert!(!progress.is_error());
    }

    #[tokio::test]
    async fn test_failure_after_cancel_during_commit_is_an_error() {
        let progress = Arc::new(ProgressMonitor::new());
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        let (committing_tx, committing_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = TaskHandle::spawn(progress.clone(), |reporter| async move {
            reporter.enter(TaskState::Committing);
            let _ = committing_tx.send(());
            let _ = go_rx.await;
            let result: Result<()> = Err(anyhow::anyhow!("disk full"));
            result
        });

        committing_rx.await.unwrap();
        handle.cancel();
        go_tx.send(()).unwrap();

        let outcome = handle.wait().await;
        assert_eq!(outcome.state(), TaskState::Error);
        assert!(progress.is_error());
        assert_eq!(progress.error_message().as_deref(), Some("disk full"));
        assert!(progress.is_finished());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
        assert!(TaskState::Error.is_terminal());
        assert!(!TaskState::Committing.is_terminal());
    }
}
