use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub event_retention_days: Option<u64>,
    pub prune_interval_hours: Option<u64>,

    pub rotation: Option<RotationFileConfig>,
}

/// `[rotation]` section, every key optional.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RotationFileConfig {
    pub promoted_cooldown_secs: Option<i64>,
    pub organic_cooldown_secs: Option<i64>,
    pub p_promoted: Option<f64>,
    pub fairness_window_secs: Option<i64>,
    pub recency_boost_unit_secs: Option<i64>,
    pub max_recency_boost: Option<f64>,
    pub max_credit_retries: Option<u32>,
    pub ledger_timeout_ms: Option<u64>,
    pub catalog_timeout_ms: Option<u64>,
    pub catalog_retry_backoff_ms: Option<u64>,
    pub advance_check_interval_ms: Option<u64>,
    pub listener_timeout_secs: Option<i64>,
    pub rng_seed: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
