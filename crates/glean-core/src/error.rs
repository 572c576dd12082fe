use serde::{Deserialize, Serialize};

/// Classification of every failure the orchestrator can observe.
///
/// The orchestrator never inspects error messages; retry decisions are made
/// solely from the kind via [`ErrorKind::is_retriable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed submission. Surfaced immediately, never retried.
    InvalidTask,
    /// Network, timeout or rate-limit failure in the extraction layer.
    TransportError,
    /// Language-model or search backend failure.
    ServiceError,
    /// The worker owning the attempt stopped sending heartbeats.
    WorkerLivenessLost,
    /// The task ran out of attempts.
    AttemptsExhausted,
    /// Unknown task id.
    NotFound,
    /// The task was cancelled by the caller.
    Cancelled,
    /// The result store rejected a write.
    StoreError,
    /// Invalid configuration.
    ConfigError,
    /// Serialization or I/O failure inside the process.
    Internal,
}

impl ErrorKind {
    /// Whether an attempt that failed with this kind may be retried.
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            ErrorKind::TransportError
                | ErrorKind::ServiceError
                | ErrorKind::WorkerLivenessLost
                | ErrorKind::StoreError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidTask => "invalid_task",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::ServiceError => "service_error",
            ErrorKind::WorkerLivenessLost => "worker_liveness_lost",
            ErrorKind::AttemptsExhausted => "attempts_exhausted",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::StoreError => "store_error",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Top-level error type for Glean.
#[derive(Debug, thiserror::Error)]
pub enum GleanError {
    /// The submission is malformed or inconsistent with its capability.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The extraction transport failed or returned a non-success status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An external service (language model, search backend) failed.
    #[error("Service error: {0}")]
    Service(String),

    /// A worker missed its heartbeat window while owning an attempt.
    #[error("Worker liveness lost: {0}")]
    WorkerLivenessLost(String),

    /// The task failed on every permitted attempt.
    #[error("Attempts exhausted after {attempts} attempt(s)")]
    AttemptsExhausted {
        /// Number of attempts that were made.
        attempts: u32,
    },

    /// No task with the given id is known.
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The task was cancelled.
    #[error("Task cancelled: {0}")]
    Cancelled(String),

    /// The result store failed to persist a record.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GleanError {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GleanError::InvalidTask(_) => ErrorKind::InvalidTask,
            GleanError::Transport(_) => ErrorKind::TransportError,
            GleanError::Service(_) => ErrorKind::ServiceError,
            GleanError::WorkerLivenessLost(_) => ErrorKind::WorkerLivenessLost,
            GleanError::AttemptsExhausted { .. } => ErrorKind::AttemptsExhausted,
            GleanError::NotFound(_) => ErrorKind::NotFound,
            GleanError::Cancelled(_) => ErrorKind::Cancelled,
            GleanError::Store(_) => ErrorKind::StoreError,
            GleanError::Config(_) => ErrorKind::ConfigError,
            GleanError::Json(_) | GleanError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for `self.kind().is_retriable()`.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

/// A convenience `Result` alias using [`GleanError`].
pub type GleanResult<T> = Result<T, GleanError>;

/// Serializable error attached to a failed [`TaskOutcome`](crate::TaskOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Taxonomy class.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl TaskError {
    /// Creates a task error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&GleanError> for TaskError {
    fn from(err: &GleanError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<GleanError> for TaskError {
    fn from(err: GleanError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classes() {
        assert!(ErrorKind::TransportError.is_retriable());
        assert!(ErrorKind::ServiceError.is_retriable());
        assert!(ErrorKind::WorkerLivenessLost.is_retriable());
        assert!(!ErrorKind::InvalidTask.is_retriable());
        assert!(!ErrorKind::AttemptsExhausted.is_retriable());
        assert!(!ErrorKind::Cancelled.is_retriable());
        assert!(!ErrorKind::NotFound.is_retriable());
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            GleanError::Transport("timeout".into()).kind(),
            ErrorKind::TransportError
        );
        assert_eq!(
            GleanError::AttemptsExhausted { attempts: 3 }.kind(),
            ErrorKind::AttemptsExhausted
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(GleanError::from(io).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_task_error_from_glean_error() {
        let err = GleanError::Service("model overloaded".into());
        let te = TaskError::from(&err);
        assert_eq!(te.kind, ErrorKind::ServiceError);
        assert!(te.message.contains("model overloaded"));
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::WorkerLivenessLost).unwrap();
        assert_eq!(json, "\"worker_liveness_lost\"");
        assert_eq!(ErrorKind::InvalidTask.to_string(), "invalid_task");
    }
}
