//! Data loading
//!
//! Turns a delimited OHLC file into a [`PriceSeries`]. Columns are located by
//! header name, so time, volume, or any other extra columns are ignored.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::{Bar, PriceSeries};

const REQUIRED_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// Load OHLC bars from a CSV file with a header row.
///
/// Header matching is case-insensitive. Bars are numbered by data row, so a
/// skipped row leaves a gap in `Bar::index`. Rows that fail OHLC validation
/// are skipped with a warning; unparseable numbers are errors.
pub fn load_csv(path: impl AsRef<Path>) -> Result<PriceSeries> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let mut columns = [0usize; 4];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .with_context(|| format!("Missing '{}' column in {}", name, path.display()))?;
    }

    let mut bars = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let mut ohlc = [0.0f64; 4];
        for ((value, &col), name) in ohlc.iter_mut().zip(&columns).zip(REQUIRED_COLUMNS) {
            let raw = record
                .get(col)
                .with_context(|| format!("Missing {} at row {}", name, row_idx + 1))?;
            *value = raw
                .parse()
                .with_context(|| format!("Failed to parse {} '{}' at row {}", name, raw, row_idx + 1))?;
        }
        let [open, high, low, close] = ohlc;

        match Bar::new(row_idx, open, high, low, close) {
            Ok(bar) => bars.push(bar),
            Err(e) => {
                invalid_count += 1;
                warn!(
                    "Skipping invalid bar at row {} in {:?}: {}",
                    row_idx + 2, // +2 for 1-indexed and header row
                    path.file_name().unwrap_or_default(),
                    e
                );
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid bars in {}",
            invalid_count,
            path.display()
        );
    }
    info!("Loaded {} bars from {}", bars.len(), path.display());

    PriceSeries::new(bars).context("Failed to build price series")
}
