#![allow(clippy::expect_used)]

use crate::llm::LanguageModel;
use glean_core::{AnalysisType, GleanResult, Task};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

const LOCAL_STRATEGY: &str = "analyze.local";
const TOP_KEYWORDS: usize = 10;
const SUMMARY_SENTENCES: usize = 3;
const WORDS_PER_MINUTE: f64 = 200.0;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'-]*").expect("valid word regex"));

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid sentence regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}[\p{L}&'-]*(?:\s+\p{Lu}[\p{L}&'-]*)*").expect("valid entity regex")
});

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he",
    "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "more", "most", "my",
    "no", "not", "of", "on", "or", "our", "out", "over", "she", "so", "some", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "to", "up", "was",
    "we", "were", "what", "when", "where", "which", "while", "who", "will", "with", "would",
    "you", "your",
];

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "best", "better", "brilliant", "love", "loved", "enjoy", "excellent", "fantastic",
    "fast", "good", "great", "happy", "helpful", "impressive", "like", "nice", "perfect",
    "pleased", "positive", "recommend", "reliable", "success", "superb", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "awful", "bad", "broken", "bug", "crash", "disappointed", "disappointing", "fail",
    "failed", "failure", "hate", "horrible", "negative", "poor", "problem", "sad", "slow",
    "terrible", "unreliable", "unhappy", "useless", "worse", "worst", "wrong",
];

/// Text analysis with local heuristics, optionally delegating to a model.
#[derive(Clone, Default)]
pub struct AnalyzeExecutor {
    model: Option<Arc<dyn LanguageModel>>,
}

impl AnalyzeExecutor {
    /// Executor that only uses local heuristics.
    pub fn local() -> Self {
        Self { model: None }
    }

    /// Executor that sends summary, sentiment and entity analysis to `model`.
    pub fn with_model(model: Arc<dyn LanguageModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Name of the configured model, if any.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    /// Strategy reported for `task`: `llm:<model>` when the model handles
    /// its analysis type, `analyze.local` otherwise.
    pub fn strategy_for(&self, task: &Task) -> String {
        match (task.analysis_type(), self.model_name()) {
            (Ok(mode), Some(model)) if mode.uses_language_model() => format!("llm:{model}"),
            _ => LOCAL_STRATEGY.to_string(),
        }
    }

    /// Runs an analyze task, returning `(payload, structured_data)`.
    pub async fn run(&self, task: &Task) -> GleanResult<(Value, Map<String, Value>)> {
        let text = task.param_str("text").unwrap_or_default();
        let mode = task.analysis_type()?;

        if mode.uses_language_model() {
            if let Some(model) = &self.model {
                debug!(task_id = %task.id, mode = %mode, model = %model.name(), "Delegating analysis");
                let output = model.complete(text, mode).await?;
                let mut structured = Map::new();
                structured.insert("model".into(), Value::String(model.name().to_string()));
                structured.insert("source_chars".into(), Value::from(text.chars().count()));
                let payload = json!({ "analysis_type": mode, "text": output });
                return Ok((payload, structured));
            }
        }

        Ok(match mode {
            AnalysisType::Summary => summarize(text),
            AnalysisType::Sentiment => sentiment(text),
            AnalysisType::Entities => entities(text),
            AnalysisType::Keywords => keywords(text),
            AnalysisType::General => general(text),
        })
    }
}

fn words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Leading sentences of the text.
pub fn summarize(text: &str) -> (Value, Map<String, Value>) {
    let all = sentences(text);
    let summary = all
        .iter()
        .take(SUMMARY_SENTENCES)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let mut structured = Map::new();
    structured.insert("method".into(), json!("lead_sentences"));
    structured.insert("sentence_count".into(), Value::from(all.len()));
    (json!({ "analysis_type": "summary", "text": summary }), structured)
}

/// Lexicon-based polarity in `[-1, 1]` with a coarse label.
pub fn sentiment(text: &str) -> (Value, Map<String, Value>) {
    let tokens = words(text);
    let positive = tokens
        .iter()
        .filter(|w| POSITIVE_WORDS.contains(&w.as_str()))
        .count();
    let negative = tokens
        .iter()
        .filter(|w| NEGATIVE_WORDS.contains(&w.as_str()))
        .count();

    let total = positive + negative;
    let score = if total == 0 {
        0.0
    } else {
        (positive as f64 - negative as f64) / total as f64
    };
    let label = if score > 0.1 {
        "positive"
    } else if score < -0.1 {
        "negative"
    } else {
        "neutral"
    };

    let mut structured = Map::new();
    structured.insert("positive_terms".into(), Value::from(positive));
    structured.insert("negative_terms".into(), Value::from(negative));
    (
        json!({
            "analysis_type": "sentiment",
            "label": label,
            "score": score,
            "text": format!("Sentiment is {label}."),
        }),
        structured,
    )
}

/// Runs of capitalized words, excluding single stop words at sentence start.
pub fn entities(text: &str) -> (Value, Map<String, Value>) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for m in ENTITY_RE.find_iter(text) {
        let name = m.as_str().trim().to_string();
        let single = !name.contains(char::is_whitespace);
        if single && STOP_WORDS.contains(&name.to_lowercase().as_str()) {
            continue;
        }
        if single && name.chars().count() < 2 {
            continue;
        }
        let count = counts.entry(name.clone()).or_insert(0);
        if *count == 0 {
            order.push(name);
        }
        *count += 1;
    }

    let list: Vec<Value> = order
        .iter()
        .map(|name| json!({ "name": name, "count": counts[name] }))
        .collect();

    let mut structured = Map::new();
    structured.insert("entity_count".into(), Value::from(order.len()));
    if !order.is_empty() {
        structured.insert("entities".into(), Value::from(order.clone()));
    }
    (
        json!({ "analysis_type": "entities", "entities": list, "text": order.join(", ") }),
        structured,
    )
}

/// Most frequent non-stop-word terms, ties broken alphabetically.
pub fn keywords(text: &str) -> (Value, Map<String, Value>) {
    let tokens = words(text);
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for w in &tokens {
        if w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()) {
            *freq.entry(w.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(TOP_KEYWORDS);

    let terms: Vec<&str> = ranked.iter().map(|(t, _)| *t).collect();
    let list: Vec<Value> = ranked
        .iter()
        .map(|(t, c)| json!({ "term": t, "count": c }))
        .collect();

    let mut structured = Map::new();
    structured.insert("word_count".into(), Value::from(tokens.len()));
    if !terms.is_empty() {
        structured.insert("keywords".into(), Value::from(terms.clone()));
    }
    (
        json!({ "analysis_type": "keywords", "keywords": list, "text": terms.join(", ") }),
        structured,
    )
}

/// Length and readability statistics.
pub fn general(text: &str) -> (Value, Map<String, Value>) {
    let tokens = words(text);
    let word_count = tokens.len();
    let sentence_count = sentences(text).len();
    let unique: std::collections::HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let avg_word_len = if word_count == 0 {
        0.0
    } else {
        tokens.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / word_count as f64
    };
    let reading_time_secs = (word_count as f64 / WORDS_PER_MINUTE * 60.0).ceil() as u64;

    let mut structured = Map::new();
    structured.insert("word_count".into(), Value::from(word_count));
    structured.insert("sentence_count".into(), Value::from(sentence_count));
    structured.insert("unique_words".into(), Value::from(unique.len()));
    structured.insert("character_count".into(), Value::from(text.chars().count()));
    structured.insert(
        "average_word_length".into(),
        json!((avg_word_len * 100.0).round() / 100.0),
    );
    structured.insert("reading_time_secs".into(), Value::from(reading_time_secs));

    (
        json!({
            "analysis_type": "general",
            "text": format!(
                "{word_count} words in {sentence_count} sentences, about {reading_time_secs}s to read."
            ),
        }),
        structured,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use glean_core::{Capability, GleanError, TaskRequest};

    fn task(params: Value) -> Task {
        Task::from_request(TaskRequest::from_json(Capability::Analyze, params), 3).unwrap()
    }

    struct EchoModel {
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, text: &str, mode: AnalysisType) -> GleanResult<String> {
            if self.fail {
                return Err(GleanError::Service("model overloaded".into()));
            }
            Ok(format!("{mode}: {text}"))
        }
    }

    #[test]
    fn test_keywords_ranked() {
        let (payload, structured) =
            keywords("Rust rust RUST is fast. Cargo builds Rust. Cargo is great.");
        assert_eq!(payload["keywords"][0]["term"], "rust");
        assert_eq!(payload["keywords"][0]["count"], 4);
        assert_eq!(payload["keywords"][1]["term"], "cargo");
        assert_eq!(structured["keywords"][0], "rust");
    }

    #[test]
    fn test_general_statistics() {
        let (_, structured) = general("One two three. Four five!");
        assert_eq!(structured["word_count"], 5);
        assert_eq!(structured["sentence_count"], 2);
        assert_eq!(structured["reading_time_secs"], 2);
    }

    #[test]
    fn test_sentiment_labels() {
        assert_eq!(sentiment("This is great and I love it").0["label"], "positive");
        assert_eq!(sentiment("Terrible, broken and slow").0["label"], "negative");
        assert_eq!(sentiment("The sky is blue").0["label"], "neutral");
    }

    #[test]
    fn test_summary_takes_lead_sentences() {
        let (payload, structured) = summarize("First. Second! Third? Fourth.");
        assert_eq!(payload["text"], "First. Second! Third?");
        assert_eq!(structured["sentence_count"], 4);
    }

    #[test]
    fn test_entities_skip_sentence_start_stop_words() {
        let (payload, _) = entities("The team at Mozilla Research met Ferris in Berlin. The end.");
        let names: Vec<&str> = payload["entities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"Mozilla Research"));
        assert!(names.contains(&"Ferris"));
        assert!(names.contains(&"Berlin"));
        assert!(!names.contains(&"The"));
    }

    #[tokio::test]
    async fn test_local_executor_defaults_to_general() {
        let exec = AnalyzeExecutor::local();
        let (payload, _) = exec.run(&task(json!({"text": "Hello world."}))).await.unwrap();
        assert_eq!(payload["analysis_type"], "general");
    }

    #[tokio::test]
    async fn test_model_delegation_for_summary() {
        let exec = AnalyzeExecutor::with_model(Arc::new(EchoModel { fail: false }));
        let (payload, structured) = exec
            .run(&task(json!({"text": "abc", "analysis_type": "summary"})))
            .await
            .unwrap();
        assert_eq!(payload["text"], "summary: abc");
        assert_eq!(structured["model"], "echo");
    }

    #[tokio::test]
    async fn test_keywords_stay_local_with_model() {
        let exec = AnalyzeExecutor::with_model(Arc::new(EchoModel { fail: true }));
        let result = exec
            .run(&task(json!({"text": "tokio tokio axum", "analysis_type": "keywords"})))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_model_failure_is_service_error() {
        let exec = AnalyzeExecutor::with_model(Arc::new(EchoModel { fail: true }));
        let err = exec
            .run(&task(json!({"text": "abc", "analysis_type": "sentiment"})))
            .await
            .unwrap_err();
        assert!(matches!(err, GleanError::Service(_)));
    }
}
