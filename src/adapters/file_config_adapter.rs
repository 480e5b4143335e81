//! INI configuration for backtest defaults.
//!
//! A missing file or missing key falls back to the stock defaults; a
//! value that does not parse is an error naming the section and key.

use configparser::ini::Ini;
use std::path::Path;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::MqlError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    /// A missing file is an empty configuration; a present but
    /// unparseable one is a config error.
    pub fn from_file(path: &str) -> Result<Self, MqlError> {
        let mut config = Ini::new();
        if Path::new(path).exists() {
            config.load(path).map_err(|reason| MqlError::ConfigParse {
                file: path.to_string(),
                reason,
            })?;
        }
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, MqlError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| MqlError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

/// Assemble run settings from the `[backtest]` section of any config
/// source. Unlike the lenient port getters, a present value that does
/// not parse is rejected here so a typo cannot silently run with a
/// default deposit.
pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, MqlError> {
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        initial_deposit: double_key(config, "initial_deposit", defaults.initial_deposit)?,
        currency: config
            .get_string("backtest", "currency")
            .unwrap_or(defaults.currency),
        symbol: config
            .get_string("backtest", "symbol")
            .unwrap_or(defaults.symbol),
        timeframe: int_key(config, "timeframe", defaults.timeframe)?,
        spread_points: int_key(config, "spread_points", defaults.spread_points)?,
    })
}

fn double_key(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, MqlError> {
    match config.get_string("backtest", key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
    }
}

fn int_key(config: &dyn ConfigPort, key: &str, default: i64) -> Result<i64, MqlError> {
    match config.get_string("backtest", key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
    }
}

fn invalid(key: &str, raw: &str) -> MqlError {
    MqlError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: format!("expected a number, got '{raw}'"),
    }
}
