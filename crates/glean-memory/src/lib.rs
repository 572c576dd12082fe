//! Downstream contextual store for finished task results.
//!
//! The orchestrator hands every successful outcome, together with a vector
//! embedding of its primary text, to a [`ResultStore`]. Writes are keyed by
//! task id and idempotent, so a replayed success report never duplicates a
//! stored record.
//!
//! # Main types
//!
//! - [`ResultStore`]: Narrow write/query interface of the store.
//! - [`InMemoryResultStore`]: Process-local store.
//! - [`FileResultStore`]: JSONL file-backed store, reloaded on open.
//! - [`LocalEmbedding`]: Deterministic bag-of-words embedding provider.

/// Embedding provider trait and local implementation.
pub mod embedding;
/// Result store trait and implementations.
pub mod store;

pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use store::{
    FileResultStore, InMemoryResultStore, PutOutcome, ResultRecord, ResultStore, ScoredResult,
};
