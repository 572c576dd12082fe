use crate::html;
use crate::transport::Transport;
use glean_core::{GleanError, GleanResult, Parameters, Strategy, StrategyRegistry, Task};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const MAX_TEXT_CHARS: usize = 100_000;

/// Fetches a URL through the transport of the selected strategy and
/// extracts its content.
#[derive(Clone)]
pub struct ExtractExecutor {
    registry: Arc<StrategyRegistry>,
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl ExtractExecutor {
    /// Executor with no transports bound.
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self {
            registry,
            transports: HashMap::new(),
        }
    }

    /// Binds a transport to a strategy name.
    pub fn with_transport(mut self, strategy: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(strategy.into(), transport);
        self
    }

    /// Strategy names that have a transport.
    pub fn transport_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Chooses the strategy for `task` among those with a transport.
    pub fn select_strategy(&self, task: &Task) -> GleanResult<Strategy> {
        self.registry.select_where(
            task.capability,
            &task.parameters,
            task.strategy_hint.as_deref(),
            |s| self.transports.contains_key(&s.name),
        )
    }

    /// Runs an extract task with an already selected strategy.
    pub async fn run(
        &self,
        task: &Task,
        strategy: &Strategy,
    ) -> GleanResult<(Value, Map<String, Value>)> {
        let url = task
            .param_str("url")
            .ok_or_else(|| GleanError::InvalidTask("missing string parameter 'url'".into()))?;

        let transport = self.transports.get(&strategy.name).ok_or_else(|| {
            GleanError::InvalidTask(format!(
                "no transport registered for strategy '{}'",
                strategy.name
            ))
        })?;

        let options = task
            .parameters
            .get("options")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Parameters::new);

        debug!(task_id = %task.id, url = %url, strategy = %strategy.name, "Extract fetch");
        let response = transport.fetch(url, &options).await?;

        if !response.is_success() {
            return Err(GleanError::Transport(format!(
                "HTTP {} from {}",
                response.status, response.final_url
            )));
        }

        let result = parse_document(&response.body, response.content_type(), &response.final_url);
        info!(
            task_id = %task.id,
            url = %response.final_url,
            strategy = %strategy.name,
            bytes = response.body.len(),
            "Extract complete"
        );
        Ok(result)
    }
}

/// Splits a fetched body into the payload and structured fields.
///
/// Empty collections are omitted so they do not count towards richness.
pub fn parse_document(
    body: &str,
    content_type: Option<&str>,
    url: &str,
) -> (Value, Map<String, Value>) {
    let mut structured = Map::new();
    structured.insert("content_hash".into(), Value::String(content_hash(body)));

    if !html::looks_like_html(body, content_type) {
        let text = html::truncate_text(body.trim(), MAX_TEXT_CHARS);
        return (serde_json::json!({ "text": text, "url": url }), structured);
    }

    let title = html::extract_title(body);
    let text = html::truncate_text(&html::extract_text(body), MAX_TEXT_CHARS);

    let links = html::extract_links(body, url);
    if !links.is_empty() {
        structured.insert("links".into(), Value::from(links));
    }
    let meta = html::extract_meta(body);
    if !meta.is_empty() {
        structured.insert("meta".into(), Value::Object(meta));
    }
    let json_ld = html::extract_json_ld(body);
    if !json_ld.is_empty() {
        structured.insert("json_ld".into(), Value::Array(json_ld));
    }

    let payload = serde_json::json!({
        "text": text,
        "title": title,
        "url": url,
    });
    (payload, structured)
}

/// Lowercase hex SHA-256 of the body.
pub fn content_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}
