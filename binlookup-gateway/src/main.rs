use anyhow::Context;
use binlookup_core::storage::{DatabaseStorage, InMemoryStorage, Storage};
use binlookup_gateway::app::{CardDataProviderPort, LookupUseCase, RateLimiterPort};
use binlookup_gateway::config::{Config, LimiterBackend, StoreBackend};
use binlookup_gateway::infra::{LocalRateLimiter, ProviderClient, RedisRateLimiter};
use binlookup_gateway::observability::{logging, metrics};
use binlookup_gateway::server::{self, AppState};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "binlookup-gateway")]
#[command(about = "BIN/IIN lookup gateway with cached, rate-limited provider fallback")]
#[command(version)]
struct Cli {
    /// Port to run the server on (overrides config and BINLOOKUP_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    match config.store.backend {
        StoreBackend::Libsql => {
            let storage = DatabaseStorage::new(&config.database_config())
                .await
                .context("failed to open card record database")?;
            Ok(Arc::new(storage))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory card store; records are lost on restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

async fn build_limiter(config: &Config) -> anyhow::Result<Arc<dyn RateLimiterPort>> {
    match config.limiter.backend {
        LimiterBackend::Redis => {
            let limiter = RedisRateLimiter::connect(&config.limiter)
                .await
                .context("failed to connect to the rate counter store")?;
            Ok(Arc::new(limiter))
        }
        LimiterBackend::Local => {
            warn!("Using in-process rate limiter; the quota is not shared between instances");
            Ok(Arc::new(LocalRateLimiter::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let _log_guard = logging::init_logging(&config.logging.directory, &config.logging.file_name);
    config.validate()?;

    let metrics_handle = metrics::init_metrics();

    let storage = build_storage(&config).await?;
    let limiter = build_limiter(&config).await?;
    let provider: Arc<dyn CardDataProviderPort> = Arc::new(ProviderClient::new(&config.upstream)?);

    let settings = config.lookup_settings();
    info!(
        rate_per_second = settings.quota.rate,
        strict_store_reads = settings.strict_store_reads,
        single_flight = settings.single_flight,
        "Lookup pipeline ready"
    );
    let lookup = Arc::new(LookupUseCase::new(storage, limiter, provider, settings));

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server host '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    server::start_server(
        AppState {
            lookup,
            metrics: metrics_handle,
        },
        addr,
    )
    .await
}
