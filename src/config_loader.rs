use anyhow::{anyhow, Result};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::domain::enums::PriceSource;

/// Top-level configuration structure containing all config sections
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub fix: FixConfig,
}

/// Strategy parameters. Brick and order sizes are decimal strings in the
/// TOML file so they stay exact.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub symbol: String,
    pub renko_size: Decimal,
    pub order_size: Decimal,

    #[serde(default = "default_max_position_held")]
    pub max_position_held: u32,

    #[serde(default = "default_price_source")]
    pub price_source: PriceSource,

    #[serde(default = "default_sandbox_execution")]
    pub sandbox_execution: bool,
}

fn default_max_position_held() -> u32 {
    1
}

fn default_price_source() -> PriceSource {
    PriceSource::Trades
}

fn default_sandbox_execution() -> bool {
    false
}

/// FIX connectivity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FixConfig {
    /// Path to the QuickFIX-style session settings file.
    pub session_config: String,
    pub username: String,
    pub password: String,
    pub account_id: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: AppConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        if config.engine.renko_size <= Decimal::ZERO {
            return Err(anyhow!("renko_size must be positive"));
        }
        if config.engine.order_size <= Decimal::ZERO {
            return Err(anyhow!("order_size must be positive"));
        }
        info!("Loaded configuration from {}", path.display());
        debug!(
            "Trading {} with brick size {}, sandbox: {}",
            config.engine.symbol, config.engine.renko_size, config.engine.sandbox_execution
        );
        Ok(config)
    }
}
