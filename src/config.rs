//! Serializable simulation configuration.

use crate::domain::{Currency, Resolution};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything needed to reproduce a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    /// Simulation start date (inclusive)
    pub start_date: NaiveDate,

    /// Simulation end date (inclusive)
    pub end_date: NaiveDate,

    /// Clock step
    pub step: Resolution,

    /// Universe of symbols to trade
    pub universe: Vec<String>,

    /// Starting cash balance
    pub initial_cash: f64,

    /// Currency the starting cash is held in
    #[serde(default = "default_currency")]
    pub currency: Currency,

    /// Commission per executed order
    #[serde(default)]
    pub transaction_fee: f64,

    /// Root directory of the historical data cache
    pub cache_dir: PathBuf,
}

fn default_currency() -> Currency {
    Currency::Usd
}

impl SimConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SimConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SimConfig {
        SimConfig {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 3, 31).unwrap(),
            step: Resolution::Minutes(1),
            universe: vec!["SPY".into(), "QQQ".into()],
            initial_cash: 10_000.0,
            currency: Currency::Usd,
            transaction_fee: 1.0,
            cache_dir: PathBuf::from("histData"),
        }
    }

    #[test]
    fn toml_roundtrip() {
        let config = sample_config();
        let toml = config.to_toml_string().unwrap();
        let deser: SimConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, deser);
    }

    #[test]
    fn optional_fields_default() {
        let toml = r#"
            start_date = "2020-01-02"
            end_date = "2020-03-31"
            step = "DAILY"
            universe = ["SPY"]
            initial_cash = 10000.0
            cache_dir = "histData"
        "#;
        let config: SimConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.currency, Currency::Usd);
        assert_eq!(config.transaction_fee, 0.0);
        assert_eq!(config.step, Resolution::Daily);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sim.toml");
        let config = sample_config();
        fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        let loaded = SimConfig::from_toml_file(&path).unwrap();
        assert_eq!(config, loaded);
    }
}
