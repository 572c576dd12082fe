use crate::config::OrchestratorConfig;
use crate::monitor::{MetricsSnapshot, WorkerMonitor};
use crate::pool;
use crate::retry::{self, RetryDecision};
use crate::task_queue::{QueueEntry, TaskQueue};
use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use glean_core::{
    quality, AbandonReason, Capability, GleanError, GleanResult, StrategyRegistry,
    Task, TaskError, TaskId, TaskOutcome, TaskRequest, TaskState, TaskView, WorkerId,
};
use glean_memory::{EmbeddingProvider, PutOutcome, ResultRecord, ResultStore};
use glean_workers::TaskExecutor;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// A task plus the orchestration bookkeeping that never leaves the engine.
#[derive(Debug)]
struct TaskRecord {
    task: Task,
    abandon_reason: Option<AbandonReason>,
    cancel_requested: bool,
    last_outcome: Option<TaskOutcome>,
    not_before: Option<DateTime<Utc>>,
    assigned_worker: Option<WorkerId>,
    assigned_at: Option<DateTime<Utc>>,
    attempt_deadline: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    /// Set while a success is being written to the store.
    finalizing: bool,
}

impl TaskRecord {
    fn new(task: Task) -> Self {
        Self {
            task,
            abandon_reason: None,
            cancel_requested: false,
            last_outcome: None,
            not_before: None,
            assigned_worker: None,
            assigned_at: None,
            attempt_deadline: None,
            finished_at: None,
            finalizing: false,
        }
    }

    fn view(&self) -> TaskView {
        TaskView {
            id: self.task.id,
            capability: self.task.capability,
            state: self.task.state,
            attempt_count: self.task.attempt_count,
            max_attempts: self.task.max_attempts,
            abandon_reason: self.abandon_reason,
            last_outcome: self.last_outcome.clone(),
        }
    }

    fn is_owned_by(&self, worker_id: &WorkerId) -> bool {
        self.task.state.is_active() && self.assigned_worker.as_ref() == Some(worker_id)
    }

    fn release(&mut self) {
        self.assigned_worker = None;
        self.assigned_at = None;
        self.attempt_deadline = None;
    }

    fn abandon(&mut self, reason: AbandonReason) {
        self.release();
        self.task.state = TaskState::Abandoned;
        self.abandon_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    fn succeed(&mut self, outcome: TaskOutcome) {
        self.release();
        self.task.state = TaskState::Succeeded;
        self.last_outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    /// Failure outcome on behalf of the bound worker, for timeouts and
    /// liveness loss.
    fn synthesized_failure(&self, error: GleanError) -> Option<TaskOutcome> {
        let worker = self.assigned_worker.clone()?;
        let started_at = self.assigned_at.unwrap_or_else(Utc::now);
        Some(TaskOutcome::failure(self.task.id, worker, started_at, error))
    }
}

/// Queue and wake-up signal of one capability.
pub(crate) struct CapabilityLane {
    pub(crate) queue: Mutex<TaskQueue>,
    pub(crate) notify: Notify,
}

impl CapabilityLane {
    fn new(aging_interval_secs: u64) -> Self {
        Self {
            queue: Mutex::new(TaskQueue::new(aging_interval_secs)),
            notify: Notify::new(),
        }
    }
}

struct PoolSlot {
    capability: Capability,
    index: usize,
    handle: JoinHandle<()>,
}

/// What `report_outcome` must do once the record lock is released.
enum Step {
    Done,
    Replay(Task),
    Persist(Task),
}

/// Central coordinator: intake, per-capability queues, dispatch, retries,
/// result forwarding and supervision.
///
/// All methods take `&self`; the orchestrator is shared as `Arc<Orchestrator>`
/// between the gateway, the worker pools and the supervisor.
///
/// Locks are always taken in the order task map, task record, then queue or
/// monitor, and none is held across an `.await`.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<StrategyRegistry>,
    store: Arc<dyn ResultStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    executors: HashMap<Capability, Arc<dyn TaskExecutor>>,
    tasks: RwLock<HashMap<TaskId, Arc<Mutex<TaskRecord>>>>,
    lanes: [CapabilityLane; 3],
    monitor: WorkerMonitor,
    shutdown_tx: watch::Sender<bool>,
    pool: Mutex<HashMap<WorkerId, PoolSlot>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Orchestrator {
    /// Creates an orchestrator with no executors. Fails on invalid config.
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<StrategyRegistry>,
        store: Arc<dyn ResultStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> GleanResult<Self> {
        config.validate()?;
        let aging = config.aging_interval_secs;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            registry,
            store,
            embedder,
            executors: HashMap::new(),
            tasks: RwLock::new(HashMap::new()),
            lanes: std::array::from_fn(|_| CapabilityLane::new(aging)),
            monitor: WorkerMonitor::new(),
            shutdown_tx,
            pool: Mutex::new(HashMap::new()),
            supervisor: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Installs the executor for its capability, replacing any previous one.
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executors.insert(executor.capability(), executor);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Strategy registry shared with the extract workers.
    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    /// Downstream result store.
    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Worker liveness and metrics.
    pub fn monitor(&self) -> &WorkerMonitor {
        &self.monitor
    }

    pub(crate) fn lane(&self, capability: Capability) -> &CapabilityLane {
        &self.lanes[capability.index()]
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Spawns the worker pools and the supervisor loop.
    ///
    /// Capabilities without an executor get no pool; their tasks wait until
    /// an external worker dequeues them.
    pub fn start(self: &Arc<Self>) -> GleanResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(GleanError::Config("orchestrator already started".into()));
        }

        for capability in Capability::ALL {
            let Some(executor) = self.executors.get(&capability).cloned() else {
                warn!(capability = %capability, "No executor installed, pool not started");
                continue;
            };
            let size = self.config.pool_sizes.get(capability);
            for index in 0..size {
                self.spawn_worker(capability, index, Arc::clone(&executor));
            }
            info!(capability = %capability, workers = size, "Worker pool started");
        }

        let this = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.supervisor_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.supervise().await,
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Supervisor stopped");
        });
        *self.supervisor.lock() = Some(handle);
        Ok(())
    }

    /// Signals every loop to stop and waits for them.
    ///
    /// Pool workers finish the attempt they are executing before exiting.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        for lane in &self.lanes {
            lane.notify.notify_waiters();
        }

        let mut handles: Vec<JoinHandle<()>> =
            self.pool.lock().drain().map(|(_, slot)| slot.handle).collect();
        if let Some(supervisor) = self.supervisor.lock().take() {
            handles.push(supervisor);
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    error!(error = %e, "Orchestrator loop ended abnormally");
                }
            }
        }
        info!("Orchestrator shut down");
    }

    /// Whether `shutdown` has been called.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    fn spawn_worker(self: &Arc<Self>, capability: Capability, index: usize, executor: Arc<dyn TaskExecutor>) {
        let id = WorkerId::new(capability, index);
        self.monitor.register(id.clone(), capability);
        let handle = tokio::spawn(pool::run_worker(
            Arc::clone(self),
            id.clone(),
            executor,
            self.subscribe_shutdown(),
        ));
        self.pool.lock().insert(
            id,
            PoolSlot {
                capability,
                index,
                handle,
            },
        );
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Validates and enqueues a task.
    pub fn submit(&self, request: TaskRequest) -> GleanResult<TaskId> {
        let task = Task::from_request(request, self.config.max_attempts)?;
        let id = task.id;
        let capability = task.capability;
        let entry = QueueEntry::for_task(&task);

        {
            let mut tasks = self.tasks.write();
            if tasks.contains_key(&id) {
                return Err(GleanError::InvalidTask(format!("task {id} already exists")));
            }
            tasks.insert(id, Arc::new(Mutex::new(TaskRecord::new(task))));
        }

        let lane = self.lane(capability);
        lane.queue.lock().push(entry);
        lane.notify.notify_one();
        debug!(task_id = %id, capability = %capability, "Task submitted");
        Ok(id)
    }

    /// Submits each request independently.
    pub fn submit_bulk(&self, requests: Vec<TaskRequest>) -> Vec<GleanResult<TaskId>> {
        let results: Vec<_> = requests.into_iter().map(|r| self.submit(r)).collect();
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        info!(
            accepted,
            rejected = results.len() - accepted,
            "Bulk submission processed"
        );
        results
    }

    /// Current view of a task.
    pub fn status(&self, task_id: TaskId) -> GleanResult<TaskView> {
        let record = self.record(task_id)?;
        let view = record.lock().view();
        Ok(view)
    }

    /// Requests cancellation.
    ///
    /// A pending task is abandoned at once. An in-flight task is abandoned
    /// when its attempt reports. Returns `false` for finished tasks and for
    /// tasks whose result is already being stored.
    pub fn cancel(&self, task_id: TaskId) -> GleanResult<bool> {
        let record = self.record(task_id)?;
        let mut rec = record.lock();
        match rec.task.state {
            TaskState::Pending => {
                self.lane(rec.task.capability).queue.lock().remove(task_id);
                rec.abandon(AbandonReason::Cancelled);
                info!(task_id = %task_id, "Pending task cancelled");
                Ok(true)
            }
            TaskState::Assigned | TaskState::Executing if rec.finalizing => Ok(false),
            TaskState::Assigned | TaskState::Executing => {
                rec.cancel_requested = true;
                info!(task_id = %task_id, "Cancellation requested for in-flight task");
                Ok(true)
            }
            TaskState::Succeeded | TaskState::Failed | TaskState::Abandoned => Ok(false),
        }
    }

    /// Number of known tasks, finished ones included until swept.
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Registers an externally managed worker.
    pub fn register_worker(&self, worker_id: WorkerId, capability: Capability) -> bool {
        self.monitor.register(worker_id, capability)
    }

    /// Liveness signal. `false` once the worker has been declared lost.
    pub fn heartbeat(&self, worker_id: &WorkerId) -> bool {
        self.monitor.heartbeat(worker_id)
    }

    /// Pops the best eligible pending task and binds it to `worker_id`.
    ///
    /// Unknown workers are registered on first use; lost workers get nothing.
    pub fn dequeue(&self, capability: Capability, worker_id: &WorkerId) -> Option<Task> {
        if self.monitor.is_lost(worker_id) {
            return None;
        }
        if !self.monitor.is_registered(worker_id) && !self.monitor.register(worker_id.clone(), capability) {
            return None;
        }

        let lane = self.lane(capability);
        loop {
            let now = Utc::now();
            let entry = lane.queue.lock().pop_ready(now)?;
            let Some(record) = self.tasks.read().get(&entry.task_id).cloned() else {
                continue;
            };
            let mut rec = record.lock();
            if rec.task.state != TaskState::Pending {
                continue;
            }

            rec.task.state = TaskState::Assigned;
            rec.task.attempt_count += 1;
            rec.not_before = None;
            rec.assigned_worker = Some(worker_id.clone());
            rec.assigned_at = Some(now);
            rec.attempt_deadline = Some(after_ms(now, self.config.attempt_timeout_ms));
            self.monitor.start_task(worker_id, entry.task_id);

            debug!(
                task_id = %entry.task_id,
                worker_id = %worker_id,
                attempt = rec.task.attempt_count,
                "Task assigned"
            );
            return Some(rec.task.clone());
        }
    }

    /// Moves an assigned task to `Executing`. `false` if `worker_id` no
    /// longer owns it.
    pub fn begin_execution(&self, task_id: TaskId, worker_id: &WorkerId) -> bool {
        let Ok(record) = self.record(task_id) else {
            return false;
        };
        let mut rec = record.lock();
        if rec.task.state == TaskState::Assigned && rec.assigned_worker.as_ref() == Some(worker_id) {
            rec.task.state = TaskState::Executing;
            true
        } else {
            false
        }
    }

    // -----------------------------------------------------------------------
    // Outcomes
    // -----------------------------------------------------------------------

    /// Applies the outcome of an attempt.
    ///
    /// Reports from a worker that no longer owns the task are ignored. A
    /// repeated success report for a `Succeeded` task re-issues the
    /// idempotent store write and changes nothing else.
    pub async fn report_outcome(&self, mut outcome: TaskOutcome) -> GleanResult<()> {
        let record = self.record(outcome.task_id)?;
        let step = {
            let mut rec = record.lock();
            self.accept_outcome(&mut rec, &mut outcome)
        };

        match step {
            Step::Done => Ok(()),
            Step::Replay(task) => {
                let put = self.persist(&task, &outcome).await?;
                debug!(task_id = %task.id, put = ?put, "Replayed success report");
                Ok(())
            }
            Step::Persist(task) => {
                let put = self.persist(&task, &outcome).await;
                self.finalize(&record, outcome, put);
                Ok(())
            }
        }
    }

    fn accept_outcome(&self, rec: &mut TaskRecord, outcome: &mut TaskOutcome) -> Step {
        let task_id = rec.task.id;

        if rec.task.state == TaskState::Succeeded && outcome.is_success() {
            outcome.quality_score = quality::score(&outcome.payload, &outcome.structured_data);
            return Step::Replay(rec.task.clone());
        }
        if rec.task.state.is_terminal() {
            warn!(task_id = %task_id, state = %rec.task.state, "Ignoring report for finished task");
            return Step::Done;
        }
        if !rec.is_owned_by(&outcome.worker_id) || rec.finalizing {
            warn!(
                task_id = %task_id,
                worker_id = %outcome.worker_id,
                "Ignoring stale report from worker that no longer owns the task"
            );
            return Step::Done;
        }

        let capability = rec.task.capability;
        let latency_ms = outcome.latency_ms();

        if rec.cancel_requested {
            self.monitor
                .finish_task(&outcome.worker_id, capability, latency_ms, outcome.is_success());
            rec.last_outcome = Some(outcome.clone());
            rec.abandon(AbandonReason::Cancelled);
            info!(task_id = %task_id, "In-flight task cancelled");
            return Step::Done;
        }

        if let Some(err) = outcome.error.clone() {
            self.monitor
                .finish_task(&outcome.worker_id, capability, latency_ms, false);
            rec.last_outcome = Some(outcome.clone());
            self.fail_attempt(rec, &err);
            return Step::Done;
        }

        outcome.quality_score = quality::score(&outcome.payload, &outcome.structured_data);
        rec.finalizing = true;
        Step::Persist(rec.task.clone())
    }

    fn finalize(&self, record: &Mutex<TaskRecord>, mut outcome: TaskOutcome, put: GleanResult<PutOutcome>) {
        let mut rec = record.lock();
        rec.finalizing = false;
        let capability = rec.task.capability;
        let latency_ms = outcome.latency_ms();

        match put {
            Ok(put) => {
                self.monitor
                    .finish_task(&outcome.worker_id, capability, latency_ms, true);
                info!(
                    task_id = %rec.task.id,
                    worker_id = %outcome.worker_id,
                    attempt = rec.task.attempt_count,
                    quality = outcome.quality_score,
                    put = ?put,
                    "Task succeeded"
                );
                rec.succeed(outcome);
            }
            Err(e) => {
                warn!(task_id = %rec.task.id, error = %e, "Result store write failed");
                self.monitor
                    .finish_task(&outcome.worker_id, capability, latency_ms, false);
                let err = TaskError::from(&e);
                outcome.error = Some(err.clone());
                rec.last_outcome = Some(outcome);
                self.fail_attempt(&mut rec, &err);
            }
        }
    }

    /// Resolves a failed attempt to a retry or an abandonment.
    fn fail_attempt(&self, rec: &mut TaskRecord, err: &TaskError) {
        rec.release();
        rec.task.state = TaskState::Failed;
        let decision = retry::decide(
            &self.config.retry_policy(),
            err.kind,
            rec.task.attempt_count,
            rec.task.max_attempts,
        );

        match decision {
            RetryDecision::Retry { delay_ms } => {
                let not_before = after_ms(Utc::now(), delay_ms);
                rec.task.state = TaskState::Pending;
                rec.not_before = Some(not_before);
                let lane = self.lane(rec.task.capability);
                lane.queue
                    .lock()
                    .push(QueueEntry::for_task(&rec.task).not_before(not_before));
                lane.notify.notify_one();
                info!(
                    task_id = %rec.task.id,
                    attempt = rec.task.attempt_count,
                    kind = %err.kind,
                    delay_ms,
                    "Attempt failed, retry scheduled"
                );
            }
            RetryDecision::Abandon(reason) => {
                rec.abandon(reason);
                warn!(
                    task_id = %rec.task.id,
                    attempt = rec.task.attempt_count,
                    kind = %err.kind,
                    error = %err.message,
                    reason = ?reason,
                    "Task abandoned"
                );
            }
        }
    }

    async fn persist(&self, task: &Task, outcome: &TaskOutcome) -> GleanResult<PutOutcome> {
        let text = quality::primary_text(&outcome.payload);
        let embedding = if text.trim().is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&text).await?
        };

        let metadata = HashMap::from([
            ("capability".to_string(), json!(task.capability)),
            ("strategy".to_string(), json!(outcome.strategy_used)),
            ("quality_score".to_string(), json!(outcome.quality_score)),
            ("worker_id".to_string(), json!(outcome.worker_id)),
            ("attempt".to_string(), json!(task.attempt_count)),
            ("latency_ms".to_string(), json!(outcome.latency_ms())),
        ]);

        self.store
            .put(ResultRecord {
                task_id: task.id,
                payload: outcome.payload.clone(),
                structured_data: outcome.structured_data.clone(),
                embedding,
                metadata,
                stored_at: Utc::now(),
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Supervision
    // -----------------------------------------------------------------------

    /// One supervisor pass: attempt timeouts, worker liveness, retention.
    ///
    /// Runs on every supervisor tick after `start`; also callable directly.
    pub async fn supervise(self: &Arc<Self>) {
        let now = Utc::now();
        let records: Vec<Arc<Mutex<TaskRecord>>> = self.tasks.read().values().cloned().collect();

        let expired: Vec<TaskOutcome> = records
            .iter()
            .filter_map(|record| {
                let rec = record.lock();
                let overdue = rec.task.state.is_active()
                    && !rec.finalizing
                    && rec.attempt_deadline.is_some_and(|d| d <= now);
                if overdue {
                    rec.synthesized_failure(GleanError::Transport("attempt timed out".into()))
                } else {
                    None
                }
            })
            .collect();
        for outcome in expired {
            warn!(task_id = %outcome.task_id, worker_id = %outcome.worker_id, "Attempt timed out");
            self.report_synthesized(outcome).await;
        }

        let window = i64::try_from(self.config.liveness_window_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        for worker_id in self.monitor.stale_workers(now, window) {
            if self.monitor.mark_lost(&worker_id).is_none() {
                continue;
            }
            warn!(worker_id = %worker_id, "Worker missed its liveness window, declared lost");

            let orphaned: Vec<TaskOutcome> = records
                .iter()
                .filter_map(|record| {
                    let rec = record.lock();
                    if rec.is_owned_by(&worker_id) && !rec.finalizing {
                        rec.synthesized_failure(GleanError::WorkerLivenessLost(worker_id.to_string()))
                    } else {
                        None
                    }
                })
                .collect();
            for outcome in orphaned {
                self.report_synthesized(outcome).await;
            }
            self.replace_worker(&worker_id);
        }

        self.sweep(now);
    }

    async fn report_synthesized(&self, outcome: TaskOutcome) {
        let task_id = outcome.task_id;
        if let Err(e) = self.report_outcome(outcome).await {
            warn!(task_id = %task_id, error = %e, "Failed to apply supervisor outcome");
        }
    }

    fn replace_worker(self: &Arc<Self>, worker_id: &WorkerId) {
        // A lost worker that is still running exits at its next heartbeat.
        let Some(slot) = self.pool.lock().remove(worker_id) else {
            return;
        };
        if self.is_shutting_down() {
            return;
        }
        if let Some(executor) = self.executors.get(&slot.capability).cloned() {
            info!(worker_id = %worker_id, capability = %slot.capability, "Replacing lost pool worker");
            self.spawn_worker(slot.capability, slot.index, executor);
        }
    }

    /// Drops finished tasks older than the retention period. 0 keeps them.
    fn sweep(&self, now: DateTime<Utc>) {
        if self.config.retention_secs == 0 {
            return;
        }
        let retention = i64::try_from(self.config.retention_secs)
            .ok()
            .and_then(TimeDelta::try_seconds);
        let Some(cutoff) = retention.and_then(|r| now.checked_sub_signed(r)) else {
            return;
        };
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, record| {
            let rec = record.lock();
            !(rec.task.state.is_terminal() && rec.finished_at.is_some_and(|at| at < cutoff))
        });
        let removed = before - tasks.len();
        if removed > 0 {
            debug!(removed, "Swept finished tasks past retention");
        }
    }

    // -----------------------------------------------------------------------
    // Metrics
    // -----------------------------------------------------------------------

    /// Per-capability and per-worker metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        let depths = std::array::from_fn(|i| self.lanes[i].queue.lock().len());
        self.monitor.snapshot(depths)
    }

    /// Tasks waiting in the capability queue, backoff-gated ones included.
    pub fn queue_depth(&self, capability: Capability) -> usize {
        self.lane(capability).queue.lock().len()
    }

    fn record(&self, task_id: TaskId) -> GleanResult<Arc<Mutex<TaskRecord>>> {
        self.tasks
            .read()
            .get(&task_id)
            .cloned()
            .ok_or_else(|| GleanError::NotFound(format!("task {task_id}")))
    }
}

fn after_ms(now: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
