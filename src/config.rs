//! Configuration management
//!
//! One JSON file carries the strategy parameters, their unit convention, the
//! equity replay settings, and the optimization grid. Pip-denominated values
//! are converted to price units here so nothing downstream sees pips.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backtest::EquitySettings;
use crate::grid::ParameterGrid;
use crate::optimizer::Objective;
use crate::strategies::StrategyParams;

/// Unit of the distance fields in the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnits {
    /// Raw price distances, used as-is
    #[default]
    Price,
    /// Pips, multiplied by `pip_size` on load
    Pips,
}

fn default_pip_size() -> f64 {
    0.0001
}

fn default_top() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub objective: Objective,
    /// Results shown in the ranking table
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            objective: Objective::Default,
            top: default_top(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub units: DistanceUnits,
    #[serde(default = "default_pip_size")]
    pub pip_size: f64,
    #[serde(default)]
    pub strategy: StrategyParams,
    /// Equity replay; omitted means metrics only
    #[serde(default)]
    pub equity: Option<EquitySettings>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub grid: ParameterGrid,
    /// Default CSV path when the CLI does not pass one
    #[serde(default)]
    pub data_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: DistanceUnits::Price,
            pip_size: default_pip_size(),
            strategy: StrategyParams::default(),
            equity: None,
            optimizer: OptimizerConfig::default(),
            grid: ParameterGrid::new(),
            data_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.units == DistanceUnits::Pips && !(self.pip_size.is_finite() && self.pip_size > 0.0)
        {
            anyhow::bail!("pip_size must be > 0, got {}", self.pip_size);
        }
        if let Some(equity) = &self.equity {
            if !(equity.starting_balance.is_finite() && equity.starting_balance > 0.0) {
                anyhow::bail!(
                    "equity.starting_balance must be > 0, got {}",
                    equity.starting_balance
                );
            }
        }
        Ok(())
    }

    /// Multiplier that turns file distances into price distances
    pub fn distance_factor(&self) -> f64 {
        match self.units {
            DistanceUnits::Price => 1.0,
            DistanceUnits::Pips => self.pip_size,
        }
    }

    /// Strategy parameters in price units, validated
    pub fn strategy_params(&self) -> Result<StrategyParams> {
        let params = self.strategy.scale_distances(self.distance_factor());
        params.validate().context("Invalid strategy parameters")?;
        Ok(params)
    }

    /// Grid with distance axes converted to price units
    pub fn resolved_grid(&self) -> ParameterGrid {
        let mut grid = self.grid.clone();
        grid.scale_distances(self.distance_factor());
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::StakePolicy;
    use approx::assert_relative_eq;
    use std::io::Write;

    const PIPS_CONFIG: &str = r#"{
        "units": "pips",
        "pip_size": 0.0001,
        "strategy": { "lookback": 10, "range_threshold": 8, "take_profit": 12,
                      "stop_loss": 20, "max_hold": 12, "spread": 2 },
        "equity": { "starting_balance": 10000.0, "stake": { "fixed": 0.01 } },
        "optimizer": { "objective": "net_profit", "top": 5 },
        "grid": { "lookback": [5, 10, 20], "take_profit": [8, 12, 20] }
    }"#;

    #[test]
    fn test_pips_are_converted() {
        let config = Config::from_json(PIPS_CONFIG).unwrap();
        let params = config.strategy_params().unwrap();
        assert_relative_eq!(params.range_threshold, 0.0008, epsilon = 1e-12);
        assert_relative_eq!(params.take_profit, 0.0012, epsilon = 1e-12);
        assert_relative_eq!(params.stop_loss, 0.0020, epsilon = 1e-12);
        assert_relative_eq!(params.spread, 0.0002, epsilon = 1e-12);
        assert_eq!(params.lookback, 10);

        let grid = config.resolved_grid();
        let axes: Vec<_> = grid.axes().collect();
        assert_eq!(axes[0].0, "lookback");
        assert_eq!(axes[0].1[2], serde_json::json!(20));
        assert_relative_eq!(axes[1].1[0].as_f64().unwrap(), 0.0008, epsilon = 1e-12);

        assert_eq!(config.optimizer.objective, Objective::NetProfit);
        assert_eq!(config.optimizer.top, 5);
        assert_eq!(config.equity.unwrap().stake, StakePolicy::Fixed(0.01));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.units, DistanceUnits::Price);
        assert_eq!(config.strategy, StrategyParams::default());
        assert!(config.grid.is_empty());
        assert!(config.equity.is_none());
        assert_eq!(config.optimizer.top, 10);
    }

    #[test]
    fn test_unknown_strategy_field_rejected() {
        let res = Config::from_json(r#"{"strategy": {"lookback": 5, "bogus": 1}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_invalid_params_surface_on_resolve() {
        let config = Config::from_json(
            r#"{"strategy": {"lookback": 0, "range_threshold": 0.001, "take_profit": 0.001,
                             "stop_loss": 0.001, "max_hold": 5}}"#,
        )
        .unwrap();
        assert!(config.strategy_params().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PIPS_CONFIG.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.units, DistanceUnits::Pips);

        assert!(Config::from_file("/nonexistent/config.json").is_err());
    }
}
