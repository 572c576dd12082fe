use async_trait::async_trait;
use glean_core::{AnalysisType, GleanError, GleanResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Language-model service used by the analyze worker.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier for logs and result metadata.
    fn name(&self) -> &str;

    /// Runs one analysis of `text`. Failures are [`GleanError::Service`].
    async fn complete(&self, text: &str, mode: AnalysisType) -> GleanResult<String>;
}

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, without the `/v1/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model id sent in the request body.
    pub model: String,
    /// Bearer token. May be empty for local servers.
    #[serde(default)]
    pub api_key: String,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    60
}

/// OpenAI-compatible API model.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the chat completions API.
pub struct OpenAiCompatibleModel {
    config: LlmConfig,
    http: reqwest::Client,
}

impl OpenAiCompatibleModel {
    /// Builds the HTTP client; fails if it cannot be constructed.
    pub fn new(config: LlmConfig) -> GleanResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GleanError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Instructions for the analysis types a model handles.
    fn system_prompt(mode: AnalysisType) -> Option<&'static str> {
        match mode {
            AnalysisType::Summary => Some(
                "Summarize the user's text in at most three sentences. Reply with the summary only.",
            ),
            AnalysisType::Sentiment => Some(
                "Classify the sentiment of the user's text as positive, negative or neutral. \
                 Reply with the label followed by a one-sentence justification.",
            ),
            AnalysisType::Entities => Some(
                "List the named entities (people, organizations, places, products) in the \
                 user's text, one per line, as `name: type`.",
            ),
            AnalysisType::Keywords | AnalysisType::General => None,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, text: &str, mode: AnalysisType) -> GleanResult<String> {
        let prompt = Self::system_prompt(mode).ok_or_else(|| {
            GleanError::InvalidTask(format!("analysis type '{mode}' is computed locally"))
        })?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "system", "content": prompt },
                { "role": "user", "content": text },
            ],
        });

        let mut request = self.http.post(&url).header("Content-Type", "application/json");
        if !self.config.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        debug!(model = %self.config.model, mode = %mode, "Language model request");

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| GleanError::Service(format!("Language model request failed: {e}")))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GleanError::Service(format!("Invalid language model response: {e}")))?;

        if !status.is_success() {
            return Err(GleanError::Service(format!(
                "Language model API error {status}: {resp_body}"
            )));
        }

        parse_completion(&resp_body)
    }
}

fn parse_completion(body: &serde_json::Value) -> GleanResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GleanError::Service("Language model returned no content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Positive. \n"}}]
        });
        assert_eq!(parse_completion(&body).unwrap(), "Positive.");
    }

    #[test]
    fn test_parse_completion_missing_content() {
        let err = parse_completion(&serde_json::json!({"choices": []})).unwrap_err();
        assert!(matches!(err, GleanError::Service(_)));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn test_local_modes_are_not_sent() {
        let config: LlmConfig = serde_json::from_value(
            serde_json::json!({"model": "m", "base_url": "http://127.0.0.1:9"}),
        )
        .unwrap();
        let model = OpenAiCompatibleModel::new(config).unwrap();
        for mode in [AnalysisType::Keywords, AnalysisType::General] {
            let err = model.complete("some text", mode).await.unwrap_err();
            assert!(matches!(err, GleanError::InvalidTask(_)));
        }
        assert!(OpenAiCompatibleModel::system_prompt(AnalysisType::Entities).is_some());
    }

    #[test]
    fn test_config_defaults() {
        let config: LlmConfig = serde_json::from_value(serde_json::json!({"model": "gpt-4o-mini"})).unwrap();
        assert_eq!(config.base_url, "https://api.openai.com");
        assert_eq!(config.max_tokens, 512);
        assert!(config.api_key.is_empty());
    }
}
