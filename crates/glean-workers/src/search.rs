use async_trait::async_trait;
use futures_util::future::join_all;
use glean_core::{GleanError, GleanResult, Task};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MAX_RESULTS: usize = 10;

/// A search result normalized across backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Short text excerpt.
    pub snippet: String,
}

/// One upstream search provider.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name, reported in `failed_backends`.
    fn name(&self) -> &str;

    /// Raw hits for `query`, at most `limit` of them.
    async fn search(&self, query: &str, limit: usize) -> GleanResult<Vec<Value>>;

    /// Maps one raw hit to a [`SearchHit`]. Hits without a URL are dropped.
    fn normalize(&self, raw: &Value) -> Option<SearchHit> {
        normalize_hit(raw)
    }
}

/// Default hit normalization, tolerant of common field spellings.
pub fn normalize_hit(raw: &Value) -> Option<SearchHit> {
    let field = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| raw.get(*k).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
    };

    let url = field(&["url", "link", "href"]).filter(|u| !u.is_empty())?;
    Some(SearchHit {
        title: field(&["title", "name"]).unwrap_or_default(),
        url,
        snippet: field(&["snippet", "description", "content"]).unwrap_or_default(),
    })
}

/// Canonical form of a URL for deduplication.
///
/// Lowercases scheme and host, and strips the fragment and a trailing slash.
pub fn normalize_url(url: &str) -> String {
    match reqwest::Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let s = parsed.to_string();
            s.strip_suffix('/').map(str::to_string).unwrap_or(s)
        }
        Err(_) => {
            let s = url.trim().split('#').next().unwrap_or_default().to_lowercase();
            s.trim_end_matches('/').to_string()
        }
    }
}

/// Settings of a [`JsonSearchBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBackendConfig {
    /// Backend name.
    pub name: String,
    /// Endpoint queried with `?q=...&limit=...`.
    pub endpoint: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Field of the response object holding the hit array.
    #[serde(default = "default_results_field")]
    pub results_field: String,
    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_results_field() -> String {
    "results".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// Search backend speaking a minimal JSON-over-GET protocol.
pub struct JsonSearchBackend {
    config: SearchBackendConfig,
    http: reqwest::Client,
}

impl JsonSearchBackend {
    /// Builds the HTTP client for `config`.
    pub fn new(config: SearchBackendConfig) -> GleanResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GleanError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl SearchBackend for JsonSearchBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn search(&self, query: &str, limit: usize) -> GleanResult<Vec<Value>> {
        let limit = limit.to_string();
        let mut request = self
            .http
            .get(&self.config.endpoint)
            .query(&[("q", query), ("limit", limit.as_str())]);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(|e| {
            GleanError::Service(format!("Search backend '{}' failed: {e}", self.config.name))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GleanError::Service(format!(
                "Search backend '{}' returned {status}",
                self.config.name
            )));
        }

        let body: Value = resp.json().await.map_err(|e| {
            GleanError::Service(format!(
                "Search backend '{}' returned invalid JSON: {e}",
                self.config.name
            ))
        })?;

        match body.get(&self.config.results_field) {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(GleanError::Service(format!(
                "Search backend '{}' response has no '{}' array",
                self.config.name, self.config.results_field
            ))),
        }
    }
}

/// Fans a query out to every configured backend and merges the hits.
#[derive(Clone, Default)]
pub struct SearchExecutor {
    backends: Vec<Arc<dyn SearchBackend>>,
}

impl SearchExecutor {
    /// Executor over `backends`. Earlier backends win duplicate URLs.
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        Self { backends }
    }

    /// Number of configured backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Runs a search task, returning `(payload, structured_data)`.
    pub async fn run(&self, task: &Task) -> GleanResult<(Value, Map<String, Value>)> {
        let query = task
            .param_str("query")
            .ok_or_else(|| GleanError::InvalidTask("missing string parameter 'query'".into()))?;
        let max_results = task
            .parameters
            .get("max_results")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_MAX_RESULTS, |n| n as usize);

        if self.backends.is_empty() {
            return Err(GleanError::Service("no search backends configured".into()));
        }

        let responses = join_all(
            self.backends
                .iter()
                .map(|b| async move { (b, b.search(query, max_results).await) }),
        )
        .await;

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        // Backend order is preserved, so the first occurrence of a URL wins.
        for (backend, response) in responses {
            match response {
                Ok(raw_hits) => {
                    for hit in raw_hits.iter().filter_map(|r| backend.normalize(r)) {
                        let key = normalize_url(&hit.url);
                        if !seen.contains(&key) {
                            seen.push(key);
                            hits.push(hit);
                        }
                    }
                }
                Err(e) => {
                    warn!(backend = %backend.name(), error = %e, "Search backend failed");
                    failed.push(backend.name().to_string());
                }
            }
        }

        if failed.len() == self.backends.len() {
            return Err(GleanError::Service(format!(
                "all search backends failed: {}",
                failed.join(", ")
            )));
        }

        hits.truncate(max_results);
        info!(task_id = %task.id, query = %query, hits = hits.len(), "Search complete");

        let mut structured = Map::new();
        structured.insert("result_count".into(), Value::from(hits.len()));
        structured.insert(
            "urls".into(),
            Value::from(hits.iter().map(|h| h.url.clone()).collect::<Vec<_>>()),
        );
        if !failed.is_empty() {
            structured.insert("failed_backends".into(), Value::from(failed));
        }

        let payload = serde_json::json!({
            "query": query,
            "results": hits,
        });
        Ok((payload, structured))
    }
}
