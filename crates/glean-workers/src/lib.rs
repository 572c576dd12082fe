//! Specialist workers for the Glean orchestrator.
//!
//! Each capability has one executor: [`SearchExecutor`], [`ExtractExecutor`]
//! and [`AnalyzeExecutor`]. They are wrapped in the closed [`Worker`] enum,
//! which implements [`TaskExecutor`], the single seam the orchestrator uses.
//! Executors keep no per-task state; they only hold `Arc` handles to their
//! collaborators.
//!
//! # Collaborators
//!
//! - [`Transport`]: fetches a URL for an extraction strategy
//!   ([`HttpTransport`] is the reference implementation).
//! - [`SearchBackend`]: one upstream search provider
//!   ([`JsonSearchBackend`]).
//! - [`LanguageModel`]: summary, sentiment and entity analysis
//!   ([`OpenAiCompatibleModel`]).

/// Analysis executor with local heuristics and model delegation.
pub mod analyze;
/// The executor seam and the closed worker enum.
pub mod executor;
/// URL extraction executor.
pub mod extract;
/// HTML parsing helpers.
pub mod html;
/// Language-model service adapter.
pub mod llm;
/// Search fan-out executor and backend adapter.
pub mod search;
/// Extraction transports.
pub mod transport;

pub use analyze::AnalyzeExecutor;
pub use executor::{ExecutionContext, TaskExecutor, Worker};
pub use extract::ExtractExecutor;
pub use llm::{LanguageModel, LlmConfig, OpenAiCompatibleModel};
pub use search::{JsonSearchBackend, SearchBackend, SearchBackendConfig, SearchExecutor, SearchHit};
pub use transport::{FetchResponse, HttpTransport, Transport};
