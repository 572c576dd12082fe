use crate::error::{GleanError, TaskError};
use crate::task::TaskId;
use crate::worker::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task this attempt belongs to.
    pub task_id: TaskId,
    /// Worker that executed the attempt.
    pub worker_id: WorkerId,
    /// Strategy selected for the attempt, if any.
    #[serde(default)]
    pub strategy_used: Option<String>,
    /// When the worker started executing.
    pub started_at: DateTime<Utc>,
    /// When the worker finished executing.
    pub finished_at: DateTime<Utc>,
    /// Primary result: extracted content, search hits or analysis output.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Auxiliary fields extracted alongside the payload.
    #[serde(default)]
    pub structured_data: serde_json::Map<String, serde_json::Value>,
    /// Quality score in `[0, 1]`, filled in by the orchestrator.
    #[serde(default)]
    pub quality_score: f64,
    /// Present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskOutcome {
    /// A successful attempt.
    pub fn success(
        task_id: TaskId,
        worker_id: WorkerId,
        started_at: DateTime<Utc>,
        payload: serde_json::Value,
        structured_data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            task_id,
            worker_id,
            strategy_used: None,
            started_at,
            finished_at: Utc::now(),
            payload,
            structured_data,
            quality_score: 0.0,
            error: None,
        }
    }

    /// A failed attempt.
    pub fn failure(
        task_id: TaskId,
        worker_id: WorkerId,
        started_at: DateTime<Utc>,
        error: impl Into<TaskError>,
    ) -> Self {
        Self {
            task_id,
            worker_id,
            strategy_used: None,
            started_at,
            finished_at: Utc::now(),
            payload: serde_json::Value::Null,
            structured_data: serde_json::Map::new(),
            quality_score: 0.0,
            error: Some(error.into()),
        }
    }

    /// Builds an outcome from an executor result.
    pub fn from_result(
        task_id: TaskId,
        worker_id: WorkerId,
        started_at: DateTime<Utc>,
        result: Result<(serde_json::Value, serde_json::Map<String, serde_json::Value>), GleanError>,
    ) -> Self {
        match result {
            Ok((payload, structured)) => {
                Self::success(task_id, worker_id, started_at, payload, structured)
            }
            Err(e) => Self::failure(task_id, worker_id, started_at, e),
        }
    }

    /// Records the strategy used for this attempt.
    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy_used = Some(name.into());
        self
    }

    /// True when the attempt carries no error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Wall-clock duration of the attempt in milliseconds.
    pub fn latency_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::Capability;

    #[test]
    fn test_success_outcome() {
        let outcome = TaskOutcome::success(
            TaskId::new(),
            WorkerId::new(Capability::Extract, 0),
            Utc::now(),
            serde_json::json!({"text": "hello"}),
            serde_json::Map::new(),
        )
        .with_strategy("http.plain");
        assert!(outcome.is_success());
        assert_eq!(outcome.strategy_used.as_deref(), Some("http.plain"));
    }

    #[test]
    fn test_failure_outcome_from_result() {
        let outcome = TaskOutcome::from_result(
            TaskId::new(),
            WorkerId::new(Capability::Search, 1),
            Utc::now(),
            Err(GleanError::Service("backend down".into())),
        );
        assert!(!outcome.is_success());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::ServiceError);
    }

    #[test]
    fn test_latency_never_negative() {
        let mut outcome = TaskOutcome::success(
            TaskId::new(),
            WorkerId::new(Capability::Analyze, 0),
            Utc::now(),
            serde_json::Value::Null,
            serde_json::Map::new(),
        );
        outcome.finished_at = outcome.started_at - chrono::Duration::seconds(1);
        assert_eq!(outcome.latency_ms(), 0);
    }
}
