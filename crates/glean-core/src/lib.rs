//! Core types and error definitions for the Glean task orchestrator.
//!
//! This crate holds everything that is shared between the orchestrator, the
//! specialist workers and the intake gateway: the task data model, the error
//! taxonomy, the strategy registry and the quality scorer. Nothing in here
//! performs I/O; the registry and scorer are read-only after start-up.
//!
//! # Main types
//!
//! - [`GleanError`]: Unified error enum, classified through [`ErrorKind`].
//! - [`Task`] / [`TaskRequest`]: A unit of work and its intake form.
//! - [`TaskOutcome`]: The result of one execution attempt.
//! - [`WorkerState`]: Snapshot of one running worker.
//! - [`StrategyRegistry`]: Deterministic extraction strategy selection.
//! - [`quality::score`]: Pure 0 to 1 content quality score.

/// Error taxonomy and retry classification.
pub mod error;
/// Execution attempt results.
pub mod outcome;
/// Content quality scoring.
pub mod quality;
/// Strategy descriptors, registry and selector.
pub mod strategy;
/// Task identifiers, requests, lifecycle states and views.
pub mod task;
/// Worker identifiers and state snapshots.
pub mod worker;

pub use error::{ErrorKind, GleanError, GleanResult, TaskError};
pub use outcome::TaskOutcome;
pub use strategy::{Strategy, StrategyRegistry, Tier};
pub use task::{
    AbandonReason, AnalysisType, Capability, Parameters, Priority, Task, TaskId, TaskRequest,
    TaskState, TaskView,
};
pub use worker::{WorkerId, WorkerState, WorkerStatus};
