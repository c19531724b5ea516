use anyhow::Result;
use clap::Parser;
use radio_rotation_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use radio_rotation_server::config::{AppConfig, CliConfig, FileConfig};
use radio_rotation_server::play_events::{PlayEventStore, SqlitePlayEventStore};
use radio_rotation_server::rotation::{
    spawn_advancement_ticker, RadioService, RotationScheduler, SystemClock,
};
use radio_rotation_server::server::{self, metrics, RequestsLoggingLevel, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding catalog.db and play_events.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in it override the CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Number of days to retain play events before pruning. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub event_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if event_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            event_retention_days: self.event_retention_days,
            prune_interval_hours: self.prune_interval_hours,
        }
    }
}

fn spawn_event_pruning(
    play_events: Arc<dyn PlayEventStore>,
    retention_days: u64,
    interval_hours: u64,
    shutdown_token: CancellationToken,
) {
    info!(
        "Event pruning enabled: retaining {} days, pruning every {} hours",
        retention_days, interval_hours
    );

    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_hours.max(1) * 60 * 60);
        let mut ticker = tokio::time::interval(interval);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_token.cancelled() => break,
            }

            let cutoff =
                chrono::Utc::now().timestamp() - (retention_days as i64 * 24 * 60 * 60);

            match play_events.prune_older_than(cutoff) {
                Ok(count) => {
                    if count > 0 {
                        info!("Pruned {} old play events", count);
                    }
                }
                Err(e) => {
                    error!("Failed to prune play events: {}", e);
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!(
        "Opening SQLite catalog database at {:?}...",
        app_config.catalog_db_path()
    );
    let catalog_store: Arc<dyn CatalogStore> =
        Arc::new(SqliteCatalogStore::new(app_config.catalog_db_path(), 4)?);
    let play_events: Arc<dyn PlayEventStore> =
        Arc::new(SqlitePlayEventStore::new(app_config.play_events_db_path())?);

    let scheduler = Arc::new(RotationScheduler::new(
        catalog_store,
        play_events.clone(),
        Arc::new(SystemClock),
        app_config.rotation.clone(),
    ));
    scheduler.restore()?;
    let radio = Arc::new(RadioService::new(scheduler));

    let shutdown_token = CancellationToken::new();

    let ticker = spawn_advancement_ticker(
        radio.clone(),
        app_config.rotation.advance_check_interval(),
        shutdown_token.clone(),
    );

    if app_config.event_retention_days > 0 {
        spawn_event_pruning(
            play_events,
            app_config.event_retention_days,
            app_config.prune_interval_hours,
            shutdown_token.clone(),
        );
    }

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        signal_token.cancel();
    });

    let result = server::run_server(server_config, radio, shutdown_token.clone()).await;
    info!("HTTP server stopped: {:?}", result);
    shutdown_token.cancel();
    let _ = ticker.await;
    result
}
