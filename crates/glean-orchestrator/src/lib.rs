//! Task orchestration for Glean.
//!
//! The [`Orchestrator`] accepts tasks, keeps one priority queue per
//! capability, hands tasks to workers, retries qualifying failures with
//! exponential backoff and forwards successful results to the result store
//! exactly once. A supervisor loop enforces attempt timeouts, worker
//! liveness and retention of finished tasks.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Intake, dispatch, outcome handling and lifecycle.
//! - [`TaskQueue`]: Per-capability queue with priority aging.
//! - [`WorkerMonitor`]: Worker liveness and metrics.
//! - [`OrchestratorConfig`]: Pool sizes, retry and timing settings.

/// Orchestrator configuration.
pub mod config;
/// Orchestrator engine: intake, dispatch, outcomes, supervision.
pub mod engine;
/// Worker and capability metrics.
pub mod monitor;
/// Worker pool loop.
mod pool;
/// Retry classification and backoff.
pub mod retry;
/// Per-capability priority queue.
pub mod task_queue;

pub use config::{OrchestratorConfig, PoolSizes};
pub use engine::Orchestrator;
pub use monitor::{CapabilityMetrics, MetricsSnapshot, WorkerMetrics, WorkerMonitor};
pub use retry::{RetryDecision, RetryPolicy};
pub use task_queue::{QueueEntry, TaskQueue};
