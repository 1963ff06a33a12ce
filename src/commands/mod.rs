//! Subcommand implementations

pub mod backtest;
pub mod optimize;

use anyhow::{Context, Result};
use hover_breakout::{data, Config, PriceSeries};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load the series from the CLI path, falling back to the config's `data_path`
pub fn load_series(config: &Config, cli_path: Option<PathBuf>) -> Result<PriceSeries> {
    let path = cli_path
        .or_else(|| config.data_path.clone())
        .context("No price data given: pass --data or set data_path in the config")?;
    info!("Loading data from: {}", path.display());
    data::load_csv(&path)
}

/// Write `value` as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
