use crate::error::{GleanError, GleanResult};
use crate::outcome::TaskOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

/// Capability-specific key/value payload of a task.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Opaque unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = GleanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| GleanError::NotFound(s.to_string()))
    }
}

/// The class of work a task requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Fan a query out to search backends.
    Search,
    /// Fetch a URL and extract its content.
    Extract,
    /// Analyze a body of text.
    Analyze,
}

impl Capability {
    /// Every capability, in a stable order.
    pub const ALL: [Capability; 3] = [Capability::Search, Capability::Extract, Capability::Analyze];

    /// Stable dense index, usable for per-capability arrays.
    pub fn index(self) -> usize {
        match self {
            Capability::Search => 0,
            Capability::Extract => 1,
            Capability::Analyze => 2,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Search => write!(f, "search"),
            Capability::Extract => write!(f, "extract"),
            Capability::Analyze => write!(f, "analyze"),
        }
    }
}

impl FromStr for Capability {
    type Err = GleanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "search" => Ok(Capability::Search),
            "extract" => Ok(Capability::Extract),
            "analyze" => Ok(Capability::Analyze),
            other => Err(GleanError::InvalidTask(format!(
                "unknown capability '{other}'"
            ))),
        }
    }
}

/// Scheduling priority; higher is served first within a capability queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    /// Background work.
    pub const LOW: Priority = Priority(10);
    /// Default priority.
    pub const MEDIUM: Priority = Priority(50);
    /// Interactive work.
    pub const HIGH: Priority = Priority(90);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::MEDIUM
    }
}

/// Lifecycle state of a task. Only moves forward; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in its capability queue.
    Pending,
    /// Bound to a worker, execution not yet started.
    Assigned,
    /// A worker is executing the current attempt.
    Executing,
    /// Finished successfully and forwarded to the result store.
    Succeeded,
    /// The current attempt failed; resolved to `Pending` or `Abandoned`.
    Failed,
    /// Given up on; see [`AbandonReason`].
    Abandoned,
}

impl TaskState {
    /// `Succeeded` or `Abandoned`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Abandoned)
    }

    /// An attempt is bound to a worker.
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Assigned | TaskState::Executing)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Assigned => "assigned",
            TaskState::Executing => "executing",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Why a task ended in [`TaskState::Abandoned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// Every permitted attempt failed with a retriable error.
    AttemptsExhausted,
    /// An attempt failed with an error that is never retried.
    NonRetriable,
    /// The caller cancelled the task.
    Cancelled,
}

/// Kind of analysis requested from an `Analyze` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// Condensed restatement of the text.
    Summary,
    /// Positive / negative / neutral classification.
    Sentiment,
    /// Named entities mentioned in the text.
    Entities,
    /// Most frequent significant terms.
    Keywords,
    /// Length and readability statistics.
    General,
}

impl AnalysisType {
    /// Whether this analysis may be delegated to a language model.
    pub fn uses_language_model(self) -> bool {
        matches!(
            self,
            AnalysisType::Summary | AnalysisType::Sentiment | AnalysisType::Entities
        )
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnalysisType::Summary => "summary",
            AnalysisType::Sentiment => "sentiment",
            AnalysisType::Entities => "entities",
            AnalysisType::Keywords => "keywords",
            AnalysisType::General => "general",
        };
        f.write_str(s)
    }
}

impl FromStr for AnalysisType {
    type Err = GleanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Ok(AnalysisType::Summary),
            "sentiment" => Ok(AnalysisType::Sentiment),
            "entities" => Ok(AnalysisType::Entities),
            "keywords" => Ok(AnalysisType::Keywords),
            "general" => Ok(AnalysisType::General),
            other => Err(GleanError::InvalidTask(format!(
                "unknown analysis_type '{other}'"
            ))),
        }
    }
}

/// Intake form of a task, as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Caller-assigned id; generated when absent.
    #[serde(default)]
    pub id: Option<TaskId>,
    /// Required capability.
    pub capability: Capability,
    /// Capability-specific parameters.
    #[serde(default)]
    pub parameters: Parameters,
    /// Scheduling priority; defaults to [`Priority::MEDIUM`].
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Name of a strategy the caller wants to force.
    #[serde(default)]
    pub strategy_hint: Option<String>,
    /// Attempt budget; defaults to the orchestrator's configured value.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl TaskRequest {
    /// Creates a request with default priority and attempt budget.
    pub fn new(capability: Capability, parameters: Parameters) -> Self {
        Self {
            id: None,
            capability,
            parameters,
            priority: None,
            strategy_hint: None,
            max_attempts: None,
        }
    }

    /// Convenience constructor from a JSON object literal.
    ///
    /// Non-object values produce an empty parameter map, which fails validation.
    pub fn from_json(capability: Capability, parameters: serde_json::Value) -> Self {
        let parameters = match parameters {
            serde_json::Value::Object(map) => map,
            _ => Parameters::new(),
        };
        Self::new(capability, parameters)
    }

    /// Sets the caller-assigned id.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Forces a strategy by name.
    pub fn with_strategy_hint(mut self, hint: impl Into<String>) -> Self {
        self.strategy_hint = Some(hint.into());
        self
    }

    /// Overrides the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// A unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id.
    pub id: TaskId,
    /// Required capability.
    pub capability: Capability,
    /// Capability-specific parameters, validated at intake.
    pub parameters: Parameters,
    /// Strategy the caller asked for, if any.
    pub strategy_hint: Option<String>,
    /// Scheduling priority.
    pub priority: Priority,
    /// Intake time; breaks priority ties (older first).
    pub created_at: DateTime<Utc>,
    /// Number of attempts started so far.
    pub attempt_count: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Lifecycle state.
    pub state: TaskState,
}

impl Task {
    /// Validates a request and builds a `Pending` task from it.
    pub fn from_request(request: TaskRequest, default_max_attempts: u32) -> GleanResult<Self> {
        validate_parameters(request.capability, &request.parameters)?;

        let max_attempts = request.max_attempts.unwrap_or(default_max_attempts);
        if max_attempts == 0 {
            return Err(GleanError::InvalidTask(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let strategy_hint = request
            .strategy_hint
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        Ok(Self {
            id: request.id.unwrap_or_default(),
            capability: request.capability,
            parameters: request.parameters,
            strategy_hint,
            priority: request.priority.unwrap_or_default(),
            created_at: Utc::now(),
            attempt_count: 0,
            max_attempts,
            state: TaskState::Pending,
        })
    }

    /// String parameter lookup.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(serde_json::Value::as_str)
    }

    /// Analysis type of an `Analyze` task (`general` when unspecified).
    pub fn analysis_type(&self) -> GleanResult<AnalysisType> {
        match self.param_str("analysis_type") {
            Some(s) => s.parse(),
            None => Ok(AnalysisType::General),
        }
    }
}

/// Checks that `parameters` match the schema of `capability`.
pub fn validate_parameters(capability: Capability, parameters: &Parameters) -> GleanResult<()> {
    if parameters.is_empty() {
        return Err(GleanError::InvalidTask(format!(
            "{capability} task requires parameters"
        )));
    }

    match capability {
        Capability::Search => {
            require_non_empty_str(parameters, "query")?;
            if let Some(v) = parameters.get("max_results") {
                match v.as_u64() {
                    Some(n) if n > 0 => {}
                    _ => {
                        return Err(GleanError::InvalidTask(
                            "max_results must be a positive integer".to_string(),
                        ))
                    }
                }
            }
        }
        Capability::Extract => {
            let url = require_non_empty_str(parameters, "url")?;
            if !is_http_url(url) {
                return Err(GleanError::InvalidTask(format!(
                    "url '{url}' is not an absolute http(s) URL"
                )));
            }
            if let Some(opts) = parameters.get("options") {
                if !opts.is_object() {
                    return Err(GleanError::InvalidTask(
                        "options must be an object".to_string(),
                    ));
                }
            }
        }
        Capability::Analyze => {
            require_non_empty_str(parameters, "text")?;
            if let Some(v) = parameters.get("analysis_type") {
                let s = v.as_str().ok_or_else(|| {
                    GleanError::InvalidTask("analysis_type must be a string".to_string())
                })?;
                s.parse::<AnalysisType>()?;
            }
        }
    }

    Ok(())
}

fn require_non_empty_str<'a>(parameters: &'a Parameters, key: &str) -> GleanResult<&'a str> {
    match parameters.get(key).and_then(serde_json::Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(GleanError::InvalidTask(format!("'{key}' must not be empty"))),
        None => Err(GleanError::InvalidTask(format!(
            "missing string parameter '{key}'"
        ))),
    }
}

fn is_http_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Read-only view of a task returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    /// Task id.
    pub id: TaskId,
    /// Required capability.
    pub capability: Capability,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Attempts started so far; never decreases.
    pub attempt_count: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Set when `state` is `Abandoned`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandon_reason: Option<AbandonReason>,
    /// Outcome of the most recent finished attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<TaskOutcome>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(capability: Capability, params: serde_json::Value) -> TaskRequest {
        TaskRequest::from_json(capability, params)
    }

    #[test]
    fn test_task_from_valid_extract_request() {
        let task = Task::from_request(
            request(Capability::Extract, json!({"url": "https://example.com/a"})),
            3,
        )
        .unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.priority, Priority::MEDIUM);
        assert_eq!(task.max_attempts, 3);
        assert_eq!(task.attempt_count, 0);
        assert_eq!(task.param_str("url"), Some("https://example.com/a"));
    }

    #[test]
    fn test_empty_parameters_rejected() {
        let err = Task::from_request(request(Capability::Search, json!({})), 3).unwrap_err();
        assert!(matches!(err, GleanError::InvalidTask(_)));
    }

    #[test]
    fn test_extract_requires_http_url() {
        for bad in [
            "ftp://example.com",
            "example.com",
            "https://",
            "https://a b",
            "http://:8080/x",
            "http://user@/x",
            "https://exa<mple>.com",
            "http://[::1/",
        ] {
            let err =
                Task::from_request(request(Capability::Extract, json!({"url": bad})), 3).unwrap_err();
            assert!(matches!(err, GleanError::InvalidTask(_)), "accepted {bad}");
        }
    }

    #[test]
    fn test_extract_url_scheme_is_case_insensitive() {
        for good in ["HTTPS://example.com/a", "http://[::1]:8080/", "http://127.0.0.1/x?q=1"] {
            assert!(
                Task::from_request(request(Capability::Extract, json!({"url": good})), 3).is_ok(),
                "rejected {good}"
            );
        }
    }

    #[test]
    fn test_parameters_must_match_capability() {
        // A search payload submitted as an extract task
        let err =
            Task::from_request(request(Capability::Extract, json!({"query": "rust"})), 3).unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_analyze_type_validation() {
        assert!(Task::from_request(
            request(
                Capability::Analyze,
                json!({"text": "hi", "analysis_type": "keywords"})
            ),
            3
        )
        .is_ok());
        assert!(Task::from_request(
            request(
                Capability::Analyze,
                json!({"text": "hi", "analysis_type": "poetry"})
            ),
            3
        )
        .is_err());
    }

    #[test]
    fn test_search_max_results_validation() {
        assert!(Task::from_request(
            request(Capability::Search, json!({"query": "q", "max_results": 0})),
            3
        )
        .is_err());
        assert!(Task::from_request(
            request(Capability::Search, json!({"query": "q", "max_results": 5})),
            3
        )
        .is_ok());
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let req = request(Capability::Search, json!({"query": "q"})).with_max_attempts(0);
        assert!(Task::from_request(req, 3).is_err());
    }

    #[test]
    fn test_caller_assigned_id_is_kept() {
        let id = TaskId::new();
        let req = request(Capability::Search, json!({"query": "q"})).with_id(id);
        assert_eq!(Task::from_request(req, 3).unwrap().id, id);
    }

    #[test]
    fn test_blank_hint_is_dropped() {
        let req = request(Capability::Search, json!({"query": "q"})).with_strategy_hint("  ");
        assert!(Task::from_request(req, 3).unwrap().strategy_hint.is_none());
    }

    #[test]
    fn test_state_classification() {
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Abandoned.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(TaskState::Assigned.is_active());
        assert!(TaskState::Executing.is_active());
        assert!(!TaskState::Failed.is_active());
    }

    #[test]
    fn test_capability_parse_and_display() {
        assert_eq!("Extract".parse::<Capability>().unwrap(), Capability::Extract);
        assert!("crawl".parse::<Capability>().is_err());
        assert_eq!(Capability::Analyze.to_string(), "analyze");
        for (i, cap) in Capability::ALL.iter().enumerate() {
            assert_eq!(cap.index(), i);
        }
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: TaskRequest = serde_json::from_value(json!({
            "capability": "search",
            "parameters": {"query": "rust async"}
        }))
        .unwrap();
        assert!(req.priority.is_none());
        assert!(req.id.is_none());
        assert_eq!(req.capability, Capability::Search);
    }
}
