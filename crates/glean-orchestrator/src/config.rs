use crate::retry::RetryPolicy;
use glean_core::{Capability, GleanError, GleanResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of pool workers per capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolSizes {
    /// Search workers.
    #[serde(default = "default_search_pool")]
    pub search: usize,
    /// Extract workers.
    #[serde(default = "default_extract_pool")]
    pub extract: usize,
    /// Analyze workers.
    #[serde(default = "default_analyze_pool")]
    pub analyze: usize,
}

impl PoolSizes {
    /// Pool size for `capability`.
    pub fn get(&self, capability: Capability) -> usize {
        match capability {
            Capability::Search => self.search,
            Capability::Extract => self.extract,
            Capability::Analyze => self.analyze,
        }
    }
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            search: default_search_pool(),
            extract: default_extract_pool(),
            analyze: default_analyze_pool(),
        }
    }
}

fn default_search_pool() -> usize {
    2
}

fn default_extract_pool() -> usize {
    4
}

fn default_analyze_pool() -> usize {
    2
}

/// Settings of the `[orchestrator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Workers spawned per capability by `start`.
    #[serde(default)]
    pub pool_sizes: PoolSizes,
    /// Attempt budget for tasks that do not set one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base of the exponential retry backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Cap of the retry backoff.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Wall-clock budget of one attempt.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// A worker silent for longer than this is considered lost.
    #[serde(default = "default_liveness_window_ms")]
    pub liveness_window_ms: u64,
    /// How often pool workers heartbeat while executing.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Supervisor tick period.
    #[serde(default = "default_supervisor_interval_ms")]
    pub supervisor_interval_ms: u64,
    /// Upper bound on how long an idle worker sleeps before re-checking its queue.
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,
    /// Seconds of waiting worth one priority point. 0 disables aging.
    #[serde(default = "default_aging_interval_secs")]
    pub aging_interval_secs: u64,
    /// How long finished tasks stay visible to status queries.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_attempt_timeout_ms() -> u64 {
    60_000
}

fn default_liveness_window_ms() -> u64 {
    30_000
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_supervisor_interval_ms() -> u64 {
    500
}

fn default_idle_poll_interval_ms() -> u64 {
    250
}

fn default_aging_interval_secs() -> u64 {
    30
}

fn default_retention_secs() -> u64 {
    3_600
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pool_sizes: PoolSizes::default(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            liveness_window_ms: default_liveness_window_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            supervisor_interval_ms: default_supervisor_interval_ms(),
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
            aging_interval_secs: default_aging_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl OrchestratorConfig {
    /// Rejects settings the orchestrator cannot run with.
    pub fn validate(&self) -> GleanResult<()> {
        if self.max_attempts == 0 {
            return Err(GleanError::Config("max_attempts must be at least 1".into()));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(GleanError::Config("attempt_timeout_ms must be positive".into()));
        }
        if self.supervisor_interval_ms == 0 || self.idle_poll_interval_ms == 0 {
            return Err(GleanError::Config(
                "supervisor and idle poll intervals must be positive".into(),
            ));
        }
        if self.heartbeat_interval_ms == 0 || self.heartbeat_interval_ms >= self.liveness_window_ms {
            return Err(GleanError::Config(format!(
                "heartbeat_interval_ms ({}) must be positive and below liveness_window_ms ({})",
                self.heartbeat_interval_ms, self.liveness_window_ms
            )));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(GleanError::Config(
                "backoff_base_ms must not exceed backoff_max_ms".into(),
            ));
        }
        Ok(())
    }

    /// Backoff settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff_base_ms: self.backoff_base_ms,
            backoff_max_ms: self.backoff_max_ms,
        }
    }

    pub(crate) fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub(crate) fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms)
    }

    pub(crate) fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}
