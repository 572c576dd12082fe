use crate::engine::Orchestrator;
use chrono::Utc;
use glean_core::{GleanError, Task, TaskOutcome, WorkerId};
use glean_workers::{ExecutionContext, TaskExecutor};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Body of one pool worker: dequeue, execute, report, until shutdown.
pub(crate) async fn run_worker(
    orchestrator: Arc<Orchestrator>,
    worker_id: WorkerId,
    executor: Arc<dyn TaskExecutor>,
    mut shutdown: watch::Receiver<bool>,
) {
    let capability = executor.capability();
    let idle_poll = orchestrator.config().idle_poll_interval();
    info!(worker_id = %worker_id, capability = %capability, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        if !orchestrator.heartbeat(&worker_id) {
            warn!(worker_id = %worker_id, "Worker no longer registered, stopping");
            break;
        }

        let Some(task) = orchestrator.dequeue(capability, &worker_id) else {
            let lane = orchestrator.lane(capability);
            tokio::select! {
                _ = lane.notify.notified() => {}
                _ = tokio::time::sleep(idle_poll) => {}
                _ = shutdown.changed() => {}
            }
            continue;
        };

        run_attempt(&orchestrator, &worker_id, executor.as_ref(), task).await;
    }

    orchestrator.monitor().deregister(&worker_id);
    info!(worker_id = %worker_id, "Worker stopped");
}

/// Executes one attempt under the attempt timeout, heartbeating meanwhile.
async fn run_attempt(
    orchestrator: &Orchestrator,
    worker_id: &WorkerId,
    executor: &dyn TaskExecutor,
    task: Task,
) {
    if !orchestrator.begin_execution(task.id, worker_id) {
        debug!(task_id = %task.id, worker_id = %worker_id, "Task no longer assigned, skipping");
        return;
    }

    let ctx = ExecutionContext::new(worker_id.clone(), task.attempt_count);
    let started_at = Utc::now();
    let execution = tokio::time::timeout(
        orchestrator.config().attempt_timeout(),
        executor.execute(&task, &ctx),
    );
    tokio::pin!(execution);

    let mut heartbeat = tokio::time::interval(orchestrator.config().heartbeat_interval());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            result = &mut execution => {
                break result.unwrap_or_else(|_| {
                    TaskOutcome::failure(
                        task.id,
                        worker_id.clone(),
                        started_at,
                        GleanError::Transport("attempt timed out".into()),
                    )
                });
            }
            _ = heartbeat.tick() => {
                orchestrator.heartbeat(worker_id);
            }
        }
    };

    if let Err(e) = orchestrator.report_outcome(outcome).await {
        warn!(task_id = %task.id, worker_id = %worker_id, error = %e, "Failed to report outcome");
    }
}
