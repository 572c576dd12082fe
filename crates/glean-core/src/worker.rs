use crate::task::{Capability, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one running worker instance, e.g. `extract-2-1f0c9a3e`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// A fresh id for the `index`-th worker of a capability pool.
    ///
    /// The random suffix keeps replacement workers distinct from the ones
    /// they replace.
    pub fn new(capability: Capability, index: usize) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{capability}-{index}-{}", &suffix[..8]))
    }

    /// Wraps an arbitrary id, for externally managed workers.
    pub fn named(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a worker currently owns an executing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Waiting for work.
    Idle,
    /// Executing `current_task_id`.
    Busy,
}

/// Real-time snapshot of a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerState {
    /// Worker id.
    pub id: WorkerId,
    /// Capability class served by this worker.
    pub capability: Capability,
    /// `Busy` iff `current_task_id` is set.
    pub status: WorkerStatus,
    /// Task whose attempt is executing.
    pub current_task_id: Option<TaskId>,
    /// Attempts that finished successfully.
    pub tasks_completed: u64,
    /// Attempts that finished with an error.
    pub tasks_failed: u64,
    /// Sum of attempt latencies, for averaging.
    pub total_latency_ms: u64,
    /// Last liveness signal.
    pub last_heartbeat: DateTime<Utc>,
}

impl WorkerState {
    /// A freshly started idle worker.
    pub fn new(id: WorkerId, capability: Capability) -> Self {
        Self {
            id,
            capability,
            status: WorkerStatus::Idle,
            current_task_id: None,
            tasks_completed: 0,
            tasks_failed: 0,
            total_latency_ms: 0,
            last_heartbeat: Utc::now(),
        }
    }

    /// Mean latency of finished attempts.
    pub fn average_latency_ms(&self) -> f64 {
        let finished = self.tasks_completed + self.tasks_failed;
        if finished == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / finished as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_ids_are_unique_per_slot() {
        let a = WorkerId::new(Capability::Extract, 0);
        let b = WorkerId::new(Capability::Extract, 0);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("extract-0-"));
    }

    #[test]
    fn test_new_worker_is_idle() {
        let state = WorkerState::new(WorkerId::named("w1"), Capability::Search);
        assert_eq!(state.status, WorkerStatus::Idle);
        assert!(state.current_task_id.is_none());
        assert_eq!(state.average_latency_ms(), 0.0);
    }

    #[test]
    fn test_average_latency() {
        let mut state = WorkerState::new(WorkerId::named("w1"), Capability::Search);
        state.tasks_completed = 3;
        state.tasks_failed = 1;
        state.total_latency_ms = 400;
        assert!((state.average_latency_ms() - 100.0).abs() < f64::EPSILON);
    }
}
