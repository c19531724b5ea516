mod file_config;

pub use file_config::{FileConfig, RotationFileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub event_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub event_retention_days: u64,
    pub prune_interval_hours: u64,

    pub rotation: RotationSettings,
}

/// Tunables of the rotation scheduler. All durations in seconds unless the
/// name says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationSettings {
    /// A promoted song is not promoted again before this much time passed.
    pub promoted_cooldown_secs: i64,
    /// Minimum gap before any song can play again organically.
    pub organic_cooldown_secs: i64,
    /// Probability of drawing from the promoted set when it is not empty.
    pub p_promoted: f64,
    /// Trailing window for play and skip counts.
    pub fairness_window_secs: i64,
    pub recency_boost_unit_secs: i64,
    pub max_recency_boost: f64,
    pub max_credit_retries: u32,
    pub ledger_timeout_ms: u64,
    pub catalog_timeout_ms: u64,
    pub catalog_retry_backoff_ms: u64,
    pub advance_check_interval_ms: u64,
    /// Listeners silent for longer than this are no longer counted as active.
    pub listener_timeout_secs: i64,
    /// Fixed seed for the selection RNG, random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            promoted_cooldown_secs: 30 * 60,
            organic_cooldown_secs: 10 * 60,
            p_promoted: 0.7,
            fairness_window_secs: 6 * 60 * 60,
            recency_boost_unit_secs: 60 * 60,
            max_recency_boost: 4.0,
            max_credit_retries: 3,
            ledger_timeout_ms: 500,
            catalog_timeout_ms: 2000,
            catalog_retry_backoff_ms: 200,
            advance_check_interval_ms: 1000,
            listener_timeout_secs: 90,
            rng_seed: None,
        }
    }
}

impl RotationSettings {
    pub fn from_file(file: RotationFileConfig) -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            promoted_cooldown_secs: file
                .promoted_cooldown_secs
                .unwrap_or(defaults.promoted_cooldown_secs),
            organic_cooldown_secs: file
                .organic_cooldown_secs
                .unwrap_or(defaults.organic_cooldown_secs),
            p_promoted: file.p_promoted.unwrap_or(defaults.p_promoted),
            fairness_window_secs: file
                .fairness_window_secs
                .unwrap_or(defaults.fairness_window_secs),
            recency_boost_unit_secs: file
                .recency_boost_unit_secs
                .unwrap_or(defaults.recency_boost_unit_secs),
            max_recency_boost: file.max_recency_boost.unwrap_or(defaults.max_recency_boost),
            max_credit_retries: file
                .max_credit_retries
                .unwrap_or(defaults.max_credit_retries),
            ledger_timeout_ms: file.ledger_timeout_ms.unwrap_or(defaults.ledger_timeout_ms),
            catalog_timeout_ms: file
                .catalog_timeout_ms
                .unwrap_or(defaults.catalog_timeout_ms),
            catalog_retry_backoff_ms: file
                .catalog_retry_backoff_ms
                .unwrap_or(defaults.catalog_retry_backoff_ms),
            advance_check_interval_ms: file
                .advance_check_interval_ms
                .unwrap_or(defaults.advance_check_interval_ms),
            listener_timeout_secs: file
                .listener_timeout_secs
                .unwrap_or(defaults.listener_timeout_secs),
            rng_seed: file.rng_seed,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.p_promoted) {
            bail!("p_promoted must be within [0, 1], got {}", self.p_promoted);
        }
        if self.organic_cooldown_secs < 0 || self.promoted_cooldown_secs < 0 {
            bail!("Cool-down windows cannot be negative");
        }
        if self.organic_cooldown_secs > self.promoted_cooldown_secs {
            bail!(
                "organic_cooldown_secs ({}) cannot exceed promoted_cooldown_secs ({})",
                self.organic_cooldown_secs,
                self.promoted_cooldown_secs
            );
        }
        if self.fairness_window_secs <= 0 || self.recency_boost_unit_secs <= 0 {
            bail!("fairness_window_secs and recency_boost_unit_secs must be positive");
        }
        if self.max_recency_boost < 1.0 {
            bail!("max_recency_boost must be at least 1.0");
        }
        if self.advance_check_interval_ms == 0 {
            bail!("advance_check_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    pub fn catalog_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.catalog_retry_backoff_ms)
    }

    pub fn advance_check_interval(&self) -> Duration {
        Duration::from_millis(self.advance_check_interval_ms)
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let event_retention_days = file
            .event_retention_days
            .unwrap_or(cli.event_retention_days);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        let rotation = RotationSettings::from_file(file.rotation.unwrap_or_default())?;

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            event_retention_days,
            prune_interval_hours,
            rotation,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn play_events_db_path(&self) -> PathBuf {
        self.db_dir.join("play_events.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
