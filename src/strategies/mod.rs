//! Breakout patterns and trade simulation
//!
//! Every pattern implements [`PatternDetector`]: given a bar index it looks at
//! the preceding window and either stays flat or reports a breakout
//! direction. Trades are then simulated by the shared [`simulator`], so
//! patterns only differ in how they pick direction.

pub mod config;
pub mod grouped_volatility;
pub mod hover_breakout;
pub mod simulator;

pub use config::{
    EntryBasis, ParamsError, PatternKind, RangeBasis, SameBarPolicy, StrategyParams,
    DISTANCE_FIELDS,
};
pub use grouped_volatility::GroupedVolatility;
pub use hover_breakout::{detect, HoverBreakout};
pub use simulator::simulate;

use crate::{Direction, PriceSeries};
use serde::{Deserialize, Serialize};

/// Breakout signal with the range it escaped from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakout {
    pub direction: Direction,
    pub range_high: f64,
    pub range_low: f64,
}

impl Breakout {
    pub fn range_width(&self) -> f64 {
        self.range_high - self.range_low
    }
}

/// Pattern detector trait - the contract every entry pattern implements.
///
/// Implementations are pure functions of the window `[i - lookback, i]`.
pub trait PatternDetector: Send + Sync {
    /// Pattern identifier (matches the `pattern` config value)
    fn name(&self) -> &'static str;

    /// Bars of history required before a signal bar
    fn lookback(&self) -> usize;

    /// Check bar `i` for a breakout.
    ///
    /// Callers must guarantee `lookback() <= i < series.len()`.
    fn detect(&self, series: &PriceSeries, i: usize) -> Option<Breakout>;
}

/// Create the detector selected by `params.pattern`
pub fn create_detector(params: &StrategyParams) -> Box<dyn PatternDetector> {
    match params.pattern {
        PatternKind::Hover => Box::new(HoverBreakout::from_params(params)),
        PatternKind::GroupedVolatility => Box::new(GroupedVolatility::from_params(params)),
    }
}

/// Format params for display
pub fn format_params(params: &StrategyParams) -> String {
    let mut out = format!(
        "LB:{} Rng:{:.5} TP:{:.5} SL:{:.5} Hold:{} Spr:{:.5}",
        params.lookback,
        params.range_threshold,
        params.take_profit,
        params.stop_loss,
        params.max_hold,
        params.spread,
    );
    if params.pattern == PatternKind::GroupedVolatility {
        out.push_str(&format!(
            " Body:{:.5} {}",
            params.candle_size,
            if params.follow_direction {
                "follow"
            } else {
                "fade"
            }
        ));
    }
    if !params.allow_overlapping_trades {
        out.push_str(" no-overlap");
    }
    out
}
