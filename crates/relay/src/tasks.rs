//! Cancellable tasks and first-completion supervision
//!
//! Every task runs under a cancellation token. Cancellation is an expected
//! outcome and is never reported as a failure.

use std::future::Future;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{RelayError, Result};

/// How a task finished
#[derive(Debug)]
pub enum TaskOutcome {
    Completed,
    Cancelled,
    Failed(RelayError),
    Panicked(String),
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Panicked(_))
    }
}

async fn run_cancellable<Fut>(token: CancellationToken, fut: Fut) -> TaskOutcome
where
    Fut: Future<Output = Result<()>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => TaskOutcome::Cancelled,
        result = fut => match result {
            Ok(()) => TaskOutcome::Completed,
            Err(e) => TaskOutcome::Failed(e),
        },
    }
}

fn panic_message(e: tokio::task::JoinError) -> TaskOutcome {
    if e.is_cancelled() {
        TaskOutcome::Cancelled
    } else {
        TaskOutcome::Panicked(e.to_string())
    }
}

/// Single task with its own cancel token
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    /// Spawn under a child token of `parent`
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let token = parent.child_token();
        let fut = f(token.clone());
        let join = tokio::spawn(run_cancellable(token.clone(), fut));
        debug!(task = name, "task spawned");
        Self { name, token, join }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request cancellation (non-blocking)
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to finish
    pub async fn join(self) -> TaskOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => panic_message(e),
        }
    }
}

/// Result of a supervised run
#[derive(Debug)]
pub struct SupervisionReport {
    /// Task that finished first
    pub first: (&'static str, TaskOutcome),
    /// Remaining tasks, cancelled after the first finished
    pub rest: Vec<(&'static str, TaskOutcome)>,
}

impl SupervisionReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &(&'static str, TaskOutcome)> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    /// Failed or panicked tasks
    pub fn failures(&self) -> Vec<(&'static str, &TaskOutcome)> {
        self.outcomes()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(name, outcome)| (*name, outcome))
            .collect()
    }

    /// First failure converted to an error
    pub fn into_result(self) -> Result<()> {
        for (task, outcome) in std::iter::once(self.first).chain(self.rest) {
            match outcome {
                TaskOutcome::Failed(e) => return Err(RelayError::task_failed(task, e.to_string())),
                TaskOutcome::Panicked(message) => {
                    return Err(RelayError::TaskPanicked {
                        task: task.to_string(),
                        message,
                    })
                }
                TaskOutcome::Completed | TaskOutcome::Cancelled => {}
            }
        }
        Ok(())
    }
}

/// Task group supervised with first-completion fan-in
pub struct TaskSet {
    token: CancellationToken,
    set: JoinSet<(&'static str, TaskOutcome)>,
    names: Vec<&'static str>,
}

impl TaskSet {
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            set: JoinSet::new(),
            names: Vec::new(),
        }
    }

    /// Token shared by every task of the set
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn spawn<F, Fut>(&mut self, name: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let fut = f(token.clone());
        self.set
            .spawn(async move { (name, run_cancellable(token, fut).await) });
        self.names.push(name);
        debug!(task = name, "supervised task spawned");
    }

    /// Wait for the first task to finish, then cancel and drain the rest
    ///
    /// Returns `None` for an empty set.
    pub async fn run_until_first(mut self) -> Option<SupervisionReport> {
        let first = Self::joined(self.set.join_next().await?);
        match &first.1 {
            TaskOutcome::Completed | TaskOutcome::Cancelled => {
                debug!(task = first.0, outcome = ?first.1, "first task finished")
            }
            TaskOutcome::Failed(e) => error!(task = first.0, error = %e, "task failed"),
            TaskOutcome::Panicked(message) => error!(task = first.0, %message, "task panicked"),
        }

        self.token.cancel();
        let mut rest = Vec::new();
        while let Some(joined) = self.set.join_next().await {
            let (name, outcome) = Self::joined(joined);
            if outcome.is_failure() {
                warn!(task = name, outcome = ?outcome, "task ended with failure during shutdown");
            }
            rest.push((name, outcome));
        }

        Some(SupervisionReport { first, rest })
    }

    fn joined(
        result: std::result::Result<(&'static str, TaskOutcome), tokio::task::JoinError>,
    ) -> (&'static str, TaskOutcome) {
        match result {
            Ok(pair) => pair,
            // The task name is lost with the panic payload
            Err(e) => ("unknown", panic_message(e)),
        }
    }
}
