use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glean_core::{GleanError, GleanResult, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A finished result as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Idempotency key.
    pub task_id: TaskId,
    /// Primary result of the task.
    pub payload: serde_json::Value,
    /// Auxiliary extracted fields.
    pub structured_data: serde_json::Map<String, serde_json::Value>,
    /// Vector embedding of the primary text.
    pub embedding: Vec<f32>,
    /// Capability, strategy, quality score and similar annotations.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the record was first stored.
    pub stored_at: DateTime<Utc>,
}

/// Whether a `put` created a record or found one already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The record was written.
    Stored,
    /// A record with this task id existed; nothing was written.
    AlreadyPresent,
}

/// Result of a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredResult {
    /// Matching record.
    pub record: ResultRecord,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Narrow interface of the downstream result store.
///
/// `put` must treat `task_id` as an idempotency key.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a record unless one with the same task id exists.
    async fn put(&self, record: ResultRecord) -> GleanResult<PutOutcome>;

    /// Fetch the record stored for a task.
    async fn get(&self, task_id: TaskId) -> GleanResult<Option<ResultRecord>>;

    /// Top-k records by cosine similarity to `query_embedding`.
    async fn search(&self, query_embedding: &[f32], top_k: usize)
        -> GleanResult<Vec<ScoredResult>>;

    /// Number of stored records.
    async fn count(&self) -> GleanResult<usize>;
}

/// In-memory result store. Suitable for tests and single-process runs.
pub struct InMemoryResultStore {
    records: RwLock<HashMap<TaskId, ResultRecord>>,
}

impl InMemoryResultStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// All records, oldest first.
    pub async fn list(&self) -> Vec<ResultRecord> {
        let records = self.records.read().await;
        let mut all: Vec<ResultRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.stored_at);
        all
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, record: ResultRecord) -> GleanResult<PutOutcome> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.task_id) {
            debug!(task_id = %record.task_id, "Result already stored, skipping");
            return Ok(PutOutcome::AlreadyPresent);
        }
        records.insert(record.task_id, record);
        Ok(PutOutcome::Stored)
    }

    async fn get(&self, task_id: TaskId) -> GleanResult<Option<ResultRecord>> {
        Ok(self.records.read().await.get(&task_id).cloned())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> GleanResult<Vec<ScoredResult>> {
        if query_embedding.is_empty() {
            return Err(GleanError::Store("Empty query embedding".to_string()));
        }

        let records = self.records.read().await;
        let mut scored: Vec<ScoredResult> = records
            .values()
            .map(|r| ScoredResult {
                score: cosine_similarity(query_embedding, &r.embedding),
                record: r.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.record.stored_at.cmp(&b.record.stored_at))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self) -> GleanResult<usize> {
        Ok(self.records.read().await.len())
    }
}

/// File-backed result store that persists records as JSONL.
///
/// Loads every record on open (the first record per task id wins) and
/// appends on each new `put`.
pub struct FileResultStore {
    path: PathBuf,
    inner: InMemoryResultStore,
    write_lock: Mutex<()>,
}

impl FileResultStore {
    /// Open the store at `path`, creating parent directories as needed.
    pub async fn open(path: PathBuf) -> GleanResult<Self> {
        let inner = InMemoryResultStore::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                GleanError::Store(format!("Failed to read result store: {e}"))
            })?;
            for line in data.lines().filter(|l| !l.trim().is_empty()) {
                let record: ResultRecord = serde_json::from_str(line)
                    .map_err(|e| GleanError::Store(format!("Invalid JSONL record: {e}")))?;
                inner.put(record).await?;
            }
            info!(path = %path.display(), records = inner.count().await?, "Result store loaded");
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GleanError::Store(format!("Failed to create dir: {e}")))?;
        }

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    async fn append_to_file(&self, record: &ResultRecord) -> GleanResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| GleanError::Store(format!("Failed to open result store: {e}")))?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| GleanError::Store(format!("Failed to write record: {e}")))?;
        file.flush()
            .await
            .map_err(|e| GleanError::Store(format!("Failed to flush record: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn put(&self, record: ResultRecord) -> GleanResult<PutOutcome> {
        // Serializes check-append-insert so two puts for one id cannot both append.
        let _guard = self.write_lock.lock().await;
        if self.inner.get(record.task_id).await?.is_some() {
            return Ok(PutOutcome::AlreadyPresent);
        }
        self.append_to_file(&record).await?;
        self.inner.put(record).await
    }

    async fn get(&self, task_id: TaskId) -> GleanResult<Option<ResultRecord>> {
        self.inner.get(task_id).await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> GleanResult<Vec<ScoredResult>> {
        self.inner.search(query_embedding, top_k).await
    }

    async fn count(&self) -> GleanResult<usize> {
        self.inner.count().await
    }
}

/// Cosine similarity between two vectors; 0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(task_id: TaskId, text: &str, embedding: Vec<f32>) -> ResultRecord {
        ResultRecord {
            task_id,
            payload: serde_json::json!({ "text": text }),
            structured_data: serde_json::Map::new(),
            embedding,
            metadata: HashMap::new(),
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = InMemoryResultStore::new();
        let id = TaskId::new();
        assert_eq!(
            store.put(record(id, "first", vec![1.0])).await.unwrap(),
            PutOutcome::Stored
        );
        assert_eq!(
            store.put(record(id, "second", vec![1.0])).await.unwrap(),
            PutOutcome::AlreadyPresent
        );
        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.payload["text"], "first");
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryResultStore::new();
        store
            .put(record(TaskId::new(), "x", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .put(record(TaskId::new(), "y", vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();
        store
            .put(record(TaskId::new(), "xy", vec![0.7, 0.7, 0.0]))
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.payload["text"], "x");
        assert_eq!(results[1].record.payload["text"], "xy");
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let store = InMemoryResultStore::new();
        assert!(store.search(&[], 5).await.is_err());
    }

    #[test]
    fn test_cosine_similarity_cases() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_file_store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("results.jsonl");
        let id = TaskId::new();

        {
            let store = FileResultStore::open(path.clone()).await.unwrap();
            store.put(record(id, "persisted", vec![0.5, 0.5])).await.unwrap();
            store.put(record(TaskId::new(), "other", vec![1.0, 0.0])).await.unwrap();
        }

        let reopened = FileResultStore::open(path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let stored = reopened.get(id).await.unwrap().unwrap();
        assert_eq!(stored.payload["text"], "persisted");
    }

    #[tokio::test]
    async fn test_file_store_replay_does_not_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let id = TaskId::new();

        let store = FileResultStore::open(path.clone()).await.unwrap();
        store.put(record(id, "once", vec![1.0])).await.unwrap();
        assert_eq!(
            store.put(record(id, "twice", vec![1.0])).await.unwrap(),
            PutOutcome::AlreadyPresent
        );

        let data = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(data.lines().count(), 1);
    }
}
