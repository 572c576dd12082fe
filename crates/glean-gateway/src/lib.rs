//! HTTP intake API for Glean.
//!
//! Exposes task submission, status, cancellation, bulk submission and the
//! metrics snapshot of an [`Orchestrator`](glean_orchestrator::Orchestrator)
//! over axum. Optional API-key auth and a token-bucket rate limit run as
//! middleware in front of every route.
//!
//! # Main types
//!
//! - [`GatewayServer`]: Builds the axum [`Router`](axum::Router).
//! - [`AuthConfig`]: Accepted API keys.
//! - [`RateLimiter`]: Token bucket per API key.
//! - [`ApiError`]: Maps [`GleanError`](glean_core::GleanError) to HTTP responses.

/// HTTP error responses.
pub mod error;
/// Route handlers.
pub mod handlers;
/// Auth and rate-limit middleware.
pub mod middleware;
/// Token-bucket rate limiter.
pub mod rate_limit;
/// Router construction.
pub mod server;

pub use error::ApiError;
pub use middleware::AuthConfig;
pub use rate_limit::RateLimiter;
pub use server::GatewayServer;
