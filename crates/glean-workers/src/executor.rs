use crate::analyze::AnalyzeExecutor;
use crate::extract::ExtractExecutor;
use crate::search::SearchExecutor;
use async_trait::async_trait;
use chrono::Utc;
use glean_core::{Capability, Task, TaskOutcome, WorkerId};
use tracing::{debug, warn};

/// Per-attempt information handed to an executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Worker running the attempt.
    pub worker_id: WorkerId,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl ExecutionContext {
    /// Context for attempt `attempt` run by `worker_id`.
    pub fn new(worker_id: WorkerId, attempt: u32) -> Self {
        Self { worker_id, attempt }
    }
}

/// The single seam between the orchestrator and the work it schedules.
///
/// `execute` never fails; errors are reported inside the returned
/// [`TaskOutcome`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Capability served by this executor.
    fn capability(&self) -> Capability;

    /// Runs one attempt of `task`.
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> TaskOutcome;
}

/// Closed set of specialist workers, one variant per capability.
#[derive(Clone)]
pub enum Worker {
    /// Search fan-out.
    Search(SearchExecutor),
    /// URL extraction.
    Extract(ExtractExecutor),
    /// Text analysis.
    Analyze(AnalyzeExecutor),
}

#[async_trait]
impl TaskExecutor for Worker {
    fn capability(&self) -> Capability {
        match self {
            Worker::Search(_) => Capability::Search,
            Worker::Extract(_) => Capability::Extract,
            Worker::Analyze(_) => Capability::Analyze,
        }
    }

    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> TaskOutcome {
        let started_at = Utc::now();
        debug!(
            task_id = %task.id,
            worker_id = %ctx.worker_id,
            attempt = ctx.attempt,
            capability = %task.capability,
            "Executing attempt"
        );

        let outcome = match self {
            Worker::Search(exec) => {
                TaskOutcome::from_result(task.id, ctx.worker_id.clone(), started_at, exec.run(task).await)
                    .with_strategy("search.fanout")
            }
            Worker::Analyze(exec) => {
                TaskOutcome::from_result(task.id, ctx.worker_id.clone(), started_at, exec.run(task).await)
                    .with_strategy(exec.strategy_for(task))
            }
            Worker::Extract(exec) => match exec.select_strategy(task) {
                Ok(strategy) => TaskOutcome::from_result(
                    task.id,
                    ctx.worker_id.clone(),
                    started_at,
                    exec.run(task, &strategy).await,
                )
                .with_strategy(strategy.name),
                Err(e) => TaskOutcome::failure(task.id, ctx.worker_id.clone(), started_at, e),
            },
        };

        if let Some(err) = &outcome.error {
            warn!(
                task_id = %task.id,
                worker_id = %ctx.worker_id,
                kind = %err.kind,
                error = %err.message,
                "Attempt failed"
            );
        }
        outcome
    }
}
