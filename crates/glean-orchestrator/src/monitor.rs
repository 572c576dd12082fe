use chrono::{DateTime, Duration, Utc};
use glean_core::{Capability, TaskId, WorkerId, WorkerState, WorkerStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Aggregate counters for one capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMetrics {
    /// Attempts that succeeded.
    pub tasks_completed: u64,
    /// Attempts that failed.
    pub tasks_failed: u64,
    /// Mean attempt latency.
    pub average_latency_ms: f64,
    /// Tasks waiting in the capability queue.
    pub current_queue_depth: usize,
}

/// Per-worker view exposed by the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WorkerMetrics {
    pub id: WorkerId,
    pub capability: Capability,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub average_latency_ms: f64,
    pub last_heartbeat: DateTime<Utc>,
}

impl From<&WorkerState> for WorkerMetrics {
    fn from(state: &WorkerState) -> Self {
        Self {
            id: state.id.clone(),
            capability: state.capability,
            status: state.status,
            current_task_id: state.current_task_id,
            tasks_completed: state.tasks_completed,
            tasks_failed: state.tasks_failed,
            average_latency_ms: state.average_latency_ms(),
            last_heartbeat: state.last_heartbeat,
        }
    }
}

/// Point-in-time metrics for all capabilities and live workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Keyed by capability; every capability is present.
    pub capabilities: BTreeMap<Capability, CapabilityMetrics>,
    /// Live workers, sorted by id.
    pub workers: Vec<WorkerMetrics>,
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CapabilityTotals {
    completed: u64,
    failed: u64,
    total_latency_ms: u64,
}

#[derive(Default)]
struct MonitorState {
    workers: HashMap<WorkerId, WorkerState>,
    lost: HashSet<WorkerId>,
    capabilities: [CapabilityTotals; 3],
}

/// Tracks liveness and counters of every registered worker.
///
/// Capability totals survive the removal of the workers that produced them.
/// A worker declared lost stays lost: its heartbeats are refused and it may
/// not register again under the same id.
#[derive(Default)]
pub struct WorkerMonitor {
    inner: RwLock<MonitorState>,
}

impl WorkerMonitor {
    /// Monitor with no workers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an idle worker. Returns `false` if the id was declared lost.
    pub fn register(&self, id: WorkerId, capability: Capability) -> bool {
        let mut state = self.inner.write();
        if state.lost.contains(&id) {
            return false;
        }
        state
            .workers
            .entry(id.clone())
            .or_insert_with(|| WorkerState::new(id, capability));
        true
    }

    /// Whether `id` is currently registered.
    pub fn is_registered(&self, id: &WorkerId) -> bool {
        self.inner.read().workers.contains_key(id)
    }

    /// Records a liveness signal. `false` for lost or unknown workers.
    pub fn heartbeat(&self, id: &WorkerId) -> bool {
        let mut state = self.inner.write();
        match state.workers.get_mut(id) {
            Some(worker) => {
                worker.last_heartbeat = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Marks a worker busy on `task_id`. Counts as a heartbeat.
    pub fn start_task(&self, id: &WorkerId, task_id: TaskId) {
        let mut state = self.inner.write();
        if let Some(worker) = state.workers.get_mut(id) {
            worker.status = WorkerStatus::Busy;
            worker.current_task_id = Some(task_id);
            worker.last_heartbeat = Utc::now();
        }
    }

    /// Records a finished attempt. Capability totals are updated even when
    /// the worker is no longer registered.
    pub fn finish_task(&self, id: &WorkerId, capability: Capability, latency_ms: u64, success: bool) {
        let mut state = self.inner.write();
        let totals = &mut state.capabilities[capability.index()];
        if success {
            totals.completed += 1;
        } else {
            totals.failed += 1;
        }
        totals.total_latency_ms += latency_ms;

        if let Some(worker) = state.workers.get_mut(id) {
            worker.status = WorkerStatus::Idle;
            worker.current_task_id = None;
            worker.total_latency_ms += latency_ms;
            if success {
                worker.tasks_completed += 1;
            } else {
                worker.tasks_failed += 1;
            }
        }
    }

    /// Workers whose last heartbeat is older than `window`.
    pub fn stale_workers(&self, now: DateTime<Utc>, window: Duration) -> Vec<WorkerId> {
        let state = self.inner.read();
        state
            .workers
            .values()
            .filter(|w| now - w.last_heartbeat > window)
            .map(|w| w.id.clone())
            .collect()
    }

    /// Removes a worker and remembers it as lost. Returns its last state.
    pub fn mark_lost(&self, id: &WorkerId) -> Option<WorkerState> {
        let mut state = self.inner.write();
        let removed = state.workers.remove(id);
        state.lost.insert(id.clone());
        removed
    }

    /// Removes a worker that stopped cleanly.
    pub fn deregister(&self, id: &WorkerId) -> Option<WorkerState> {
        self.inner.write().workers.remove(id)
    }

    /// Whether `id` was declared lost.
    pub fn is_lost(&self, id: &WorkerId) -> bool {
        self.inner.read().lost.contains(id)
    }

    /// Current state of a worker.
    pub fn get(&self, id: &WorkerId) -> Option<WorkerState> {
        self.inner.read().workers.get(id).cloned()
    }

    /// Number of registered workers serving `capability`.
    pub fn worker_count(&self, capability: Capability) -> usize {
        self.inner
            .read()
            .workers
            .values()
            .filter(|w| w.capability == capability)
            .count()
    }

    /// Builds a snapshot; `queue_depths` is indexed by [`Capability::index`].
    pub fn snapshot(&self, queue_depths: [usize; 3]) -> MetricsSnapshot {
        let state = self.inner.read();
        let capabilities = Capability::ALL
            .iter()
            .map(|&cap| {
                let totals = state.capabilities[cap.index()];
                let finished = totals.completed + totals.failed;
                let average_latency_ms = if finished == 0 {
                    0.0
                } else {
                    totals.total_latency_ms as f64 / finished as f64
                };
                (
                    cap,
                    CapabilityMetrics {
                        tasks_completed: totals.completed,
                        tasks_failed: totals.failed,
                        average_latency_ms,
                        current_queue_depth: queue_depths[cap.index()],
                    },
                )
            })
            .collect();

        let mut workers: Vec<WorkerMetrics> =
            state.workers.values().map(WorkerMetrics::from).collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));

        MetricsSnapshot {
            capabilities,
            workers,
            generated_at: Utc::now(),
        }
    }
}
