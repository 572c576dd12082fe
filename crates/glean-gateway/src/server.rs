use crate::handlers::{self, AppState};
use crate::middleware::{auth_middleware, rate_limit_middleware, AuthConfig, MiddlewareState};
use crate::rate_limit::RateLimiter;
use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use glean_orchestrator::Orchestrator;
use std::sync::Arc;
use tower::ServiceBuilder;

/// The intake API server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth or rate limiting.
    pub fn build(orchestrator: Arc<Orchestrator>) -> Router {
        Self::build_with_middleware(orchestrator, None, AuthConfig::default())
    }

    /// Build the gateway with optional rate limiting and auth middleware.
    pub fn build_with_middleware(
        orchestrator: Arc<Orchestrator>,
        rate_limiter: Option<Arc<RateLimiter>>,
        auth_config: AuthConfig,
    ) -> Router {
        let state = Arc::new(AppState { orchestrator });

        let app = Router::new()
            .route("/tasks", post(handlers::submit_task))
            .route("/tasks:bulk", post(handlers::submit_bulk))
            .route("/tasks/{id}", get(handlers::get_task))
            .route("/tasks/{id}/cancel", post(handlers::cancel_task))
            .route("/metrics", get(handlers::metrics))
            .route("/health", get(handlers::health))
            .with_state(state);

        if rate_limiter.is_none() && !auth_config.is_enabled() {
            return app;
        }

        let mw_state = Arc::new(MiddlewareState {
            rate_limiter,
            auth: auth_config,
        });
        // auth runs first, so rejected keys never consume tokens
        app.layer(
            ServiceBuilder::new()
                .layer(axum_mw::from_fn_with_state(
                    mw_state.clone(),
                    auth_middleware,
                ))
                .layer(axum_mw::from_fn_with_state(mw_state, rate_limit_middleware)),
        )
    }
}
