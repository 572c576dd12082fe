use crate::error::ApiError;
use crate::rate_limit::RateLimiter;
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Longest `Retry-After` the gateway advertises, in seconds.
const MAX_RETRY_AFTER_SECS: u64 = 3600;

const ANONYMOUS_BUCKET: &str = "anonymous";

/// Keys accepted by the intake API.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Accepted keys. Empty disables authentication.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Accepts exactly `api_keys`.
    pub fn new(api_keys: Vec<String>) -> Self {
        Self { api_keys }
    }

    /// Whether any key is configured.
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }
}

/// State shared by the auth and rate-limit layers.
#[derive(Clone)]
pub struct MiddlewareState {
    /// `None` disables rate limiting.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    /// Accepted keys.
    pub auth: AuthConfig,
}

/// `?api_key=` query parameter.
#[derive(Debug, Deserialize, Default)]
pub struct AuthQuery {
    /// Key passed in the query string.
    pub api_key: Option<String>,
}

/// Who is calling, as far as auth and rate limiting are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Client {
    Key(String),
    Anonymous,
}

impl Client {
    /// `Authorization: Bearer <key>` wins over `?api_key=`.
    fn identify(headers: &HeaderMap, query: &AuthQuery) -> Self {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|k| !k.is_empty());
        match bearer.map(str::to_owned).or_else(|| query.api_key.clone()) {
            Some(key) => Client::Key(key),
            None => Client::Anonymous,
        }
    }

    /// Only accepted keys get a bucket of their own. Anything else shares
    /// the anonymous bucket, so rotating unknown keys buys no extra quota.
    fn bucket<'a>(&'a self, auth: &AuthConfig) -> &'a str {
        match self {
            Client::Key(key) if auth.accepts(key) => key,
            _ => ANONYMOUS_BUCKET,
        }
    }
}

/// Rejects requests without an accepted key. A no-op when auth is disabled.
pub async fn auth_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !state.auth.is_enabled() {
        return next.run(request).await;
    }

    let message = match Client::identify(&headers, &query) {
        Client::Key(key) if state.auth.accepts(&key) => return next.run(request).await,
        Client::Key(_) => "Invalid API key",
        Client::Anonymous => "API key required",
    };
    warn!(path = %request.uri().path(), reason = message, "Intake request rejected");
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", message).into_response()
}

/// Spends one token from the caller's bucket, or answers 429 with
/// `Retry-After`.
pub async fn rate_limit_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = &state.rate_limiter else {
        return next.run(request).await;
    };

    let client = Client::identify(&headers, &query);
    let bucket = client.bucket(&state.auth);
    match limiter.try_acquire(bucket).await {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after = wait.as_secs().saturating_add(1).min(MAX_RETRY_AFTER_SECS);
            warn!(
                anonymous = bucket == ANONYMOUS_BUCKET,
                retry_after,
                "Intake request rate limited"
            );
            (
                [(header::RETRY_AFTER, retry_after.to_string())],
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", "Rate limit exceeded"),
            )
                .into_response()
        }
    }
}
