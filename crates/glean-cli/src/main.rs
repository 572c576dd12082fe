//! `glean` command-line entry point.

use clap::{Parser, Subcommand};
use glean_core::{StrategyRegistry, Tier};
use glean_gateway::{AuthConfig, GatewayServer, RateLimiter};
use glean_memory::{FileResultStore, InMemoryResultStore, LocalEmbedding, ResultStore};
use glean_orchestrator::{Orchestrator, OrchestratorConfig};
use glean_workers::{
    AnalyzeExecutor, ExtractExecutor, HttpTransport, JsonSearchBackend, LlmConfig,
    OpenAiCompatibleModel, SearchBackend, SearchBackendConfig, SearchExecutor, Worker,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LLM_API_KEY_ENV: &str = "GLEAN_LLM_API_KEY";

/// Rate-limit buckets idle this long are dropped.
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "glean", version, about = "Multi-agent web data orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "glean.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the orchestrator and the intake API
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the registered extraction strategies
    Strategies,
}

#[derive(Debug, Default, Deserialize)]
struct GleanConfig {
    #[serde(default)]
    orchestrator: OrchestratorConfig,
    #[serde(default)]
    strategies: StrategiesConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    security: SecurityConfig,
    #[serde(default)]
    llm: Option<LlmConfig>,
    #[serde(default)]
    search_backends: Vec<SearchBackendConfig>,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize)]
struct StrategiesConfig {
    #[serde(default = "default_min_reliability")]
    min_reliability: Tier,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            min_reliability: default_min_reliability(),
        }
    }
}

fn default_min_reliability() -> Tier {
    Tier::Medium
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize)]
struct SecurityConfig {
    #[serde(default)]
    api_keys: Vec<String>,
    #[serde(default = "default_max_rps")]
    max_requests_per_second: f64,
    #[serde(default = "default_max_burst")]
    max_burst: f64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            max_requests_per_second: default_max_rps(),
            max_burst: default_max_burst(),
        }
    }
}

fn default_max_rps() -> f64 {
    20.0
}

fn default_max_burst() -> f64 {
    40.0
}

/// `path` unset keeps results in memory only.
#[derive(Debug, Default, Deserialize)]
struct StoreConfig {
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingConfig {
    #[serde(default = "default_dimension")]
    dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

fn default_dimension() -> usize {
    256
}

async fn load_config(path: &Path) -> anyhow::Result<GleanConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    parse_config(&raw)
}

fn parse_config(raw: &str) -> anyhow::Result<GleanConfig> {
    let mut config: GleanConfig = toml::from_str(raw)?;
    config.orchestrator.validate()?;
    if let Some(llm) = config.llm.as_mut() {
        if let Ok(key) = std::env::var(LLM_API_KEY_ENV) {
            llm.api_key = key;
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = load_config(&cli.config).await?;
            serve(config, host, port).await?;
        }
        Commands::Strategies => {
            let min_reliability = if cli.config.exists() {
                load_config(&cli.config).await?.strategies.min_reliability
            } else {
                default_min_reliability()
            };
            print_strategies(&StrategyRegistry::with_defaults(min_reliability));
        }
    }

    Ok(())
}

async fn serve(config: GleanConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let registry = Arc::new(StrategyRegistry::with_defaults(
        config.strategies.min_reliability,
    ));

    let store: Arc<dyn ResultStore> = match &config.store.path {
        Some(path) => {
            info!(path = %path.display(), "Using file result store");
            Arc::new(FileResultStore::open(path.clone()).await?)
        }
        None => Arc::new(InMemoryResultStore::new()),
    };

    let extract = ExtractExecutor::new(registry.clone())
        .with_transport("http.plain", Arc::new(HttpTransport::plain()?))
        .with_transport("http.stealth", Arc::new(HttpTransport::stealth()?));
    info!(transports = ?extract.transport_names(), "Extract transports bound");

    let mut backends: Vec<Arc<dyn SearchBackend>> = Vec::new();
    for backend in config.search_backends {
        info!(backend = %backend.name, "Search backend configured");
        backends.push(Arc::new(JsonSearchBackend::new(backend)?));
    }
    let search = SearchExecutor::new(backends);
    if search.backend_count() == 0 {
        warn!("No search backends configured, search tasks will fail");
    }

    let analyze = match config.llm {
        Some(llm) => {
            info!(model = %llm.model, base_url = %llm.base_url, "Analyze worker uses language model");
            AnalyzeExecutor::with_model(Arc::new(OpenAiCompatibleModel::new(llm)?))
        }
        None => AnalyzeExecutor::local(),
    };

    let orchestrator = Arc::new(
        Orchestrator::new(
            config.orchestrator,
            registry,
            store,
            Arc::new(LocalEmbedding::new(config.embedding.dimension)),
        )?
        .with_executor(Arc::new(Worker::Search(search)))
        .with_executor(Arc::new(Worker::Extract(extract)))
        .with_executor(Arc::new(Worker::Analyze(analyze))),
    );
    orchestrator.start()?;

    let rate_limiter = Arc::new(RateLimiter::new(
        config.security.max_burst,
        config.security.max_requests_per_second,
    ));
    let limiter = Arc::clone(&rate_limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_IDLE);
        loop {
            ticker.tick().await;
            limiter.cleanup(RATE_LIMIT_IDLE).await;
        }
    });

    let auth = AuthConfig::new(config.security.api_keys);
    if auth.is_enabled() {
        info!(keys = auth.api_keys.len(), "API key authentication enabled");
    }
    let app = GatewayServer::build_with_middleware(orchestrator.clone(), Some(rate_limiter), auth);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Glean listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    orchestrator.shutdown().await;
    info!("Glean stopped");
    Ok(())
}

fn print_strategies(registry: &StrategyRegistry) {
    println!(
        "{:<16} {:<10} {:<8} {:<12} {:<10} {}",
        "NAME", "CAPABILITY", "SPEED", "RELIABILITY", "DETECTION", "JS"
    );
    for s in registry.list() {
        let marker = if s.reliability_tier < registry.min_reliability() {
            " (below min reliability)"
        } else {
            ""
        };
        println!(
            "{:<16} {:<10} {:<8} {:<12} {:<10} {}{marker}",
            s.name,
            s.capability.to_string(),
            s.speed_tier.to_string(),
            s.reliability_tier.to_string(),
            s.detection_risk_tier.to_string(),
            if s.renders_js { "yes" } else { "no" },
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.strategies.min_reliability, Tier::Medium);
        assert!(config.llm.is_none());
        assert!(config.search_backends.is_empty());
        assert!(config.store.path.is_none());
        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.orchestrator.max_attempts, OrchestratorConfig::default().max_attempts);
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
            [orchestrator]
            max_attempts = 5
            aging_interval_secs = 10

            [orchestrator.pool_sizes]
            extract = 8

            [strategies]
            min_reliability = "high"

            [server]
            port = 9000

            [security]
            api_keys = ["k1"]
            max_burst = 5.0

            [store]
            path = "results.jsonl"

            [[search_backends]]
            name = "local"
            endpoint = "http://127.0.0.1:7700/search"
        "#;
        let config = parse_config(raw).unwrap();
        assert_eq!(config.orchestrator.max_attempts, 5);
        assert_eq!(config.orchestrator.aging_interval_secs, 10);
        assert_eq!(config.orchestrator.pool_sizes.extract, 8);
        assert_eq!(config.orchestrator.pool_sizes.search, 2);
        assert_eq!(config.strategies.min_reliability, Tier::High);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.security.api_keys, vec!["k1".to_string()]);
        assert_eq!(config.security.max_burst, 5.0);
        assert_eq!(config.store.path, Some(PathBuf::from("results.jsonl")));
        assert_eq!(config.search_backends.len(), 1);
        assert_eq!(config.search_backends[0].results_field, "results");
    }

    #[test]
    fn invalid_orchestrator_settings_are_rejected() {
        assert!(parse_config("[orchestrator]\nmax_attempts = 0\n").is_err());
        assert!(parse_config("[strategies]\nmin_reliability = \"extreme\"\n").is_err());
    }

    #[tokio::test]
    async fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glean.toml");
        std::fs::write(&path, "[server]\nhost = \"127.0.0.1\"\n").unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(load_config(&dir.path().join("missing.toml")).await.is_err());
    }
}
