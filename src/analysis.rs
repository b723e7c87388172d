// =============================================================================
// Moving-Average Analysis
// =============================================================================
//
// Combines the indicator functions over a frozen bar series:
//   short_ma      = SMA(closes, 10)
//   long_ma       = SMA(closes, 50)
//   signal        = crossover(short_ma, long_ma)
//   position_pct  = price position inside the 20-bar high/low range
//
// Values are kept at full precision; rounding belongs to the reporter.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{derive_signal, ma_difference_pct, price_position, recent_range, sma};
use crate::market_data::BarSeries;
use crate::types::Signal;

/// Look-back windows for the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindows {
    pub short: usize,
    pub long: usize,
    pub position: usize,
}

impl Default for AnalysisWindows {
    fn default() -> Self {
        Self {
            short: 10,
            long: 50,
            position: 20,
        }
    }
}

/// Full snapshot of the indicators for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub last_price: Option<f64>,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub ma_difference_pct: Option<f64>,
    pub signal: Signal,
    pub price_position_pct: Option<f64>,
    pub recent_high: Option<f64>,
    pub recent_low: Option<f64>,
    pub closes: usize,
    pub highs: usize,
    pub lows: usize,
    pub windows: AnalysisWindows,
}

/// Run every indicator over `series`.
pub fn analyze(series: &BarSeries, windows: AnalysisWindows) -> Analysis {
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();

    debug!(
        bars = series.len(),
        closes = closes.len(),
        highs = highs.len(),
        lows = lows.len(),
        "extracted price series"
    );

    let last_price = closes.last().copied();
    let short_ma = sma(&closes, windows.short);
    let long_ma = sma(&closes, windows.long);

    // The range only counts when the close series is long enough as well.
    let range = if closes.len() >= windows.position {
        recent_range(&highs, &lows, windows.position)
    } else {
        None
    };
    let (recent_high, recent_low) = match range {
        Some((high, low)) => (Some(high), Some(low)),
        None => (None, None),
    };

    Analysis {
        last_price,
        short_ma,
        long_ma,
        ma_difference_pct: ma_difference_pct(short_ma, long_ma),
        signal: derive_signal(short_ma, long_ma),
        price_position_pct: price_position(last_price, recent_high, recent_low),
        recent_high,
        recent_low,
        closes: closes.len(),
        highs: highs.len(),
        lows: lows.len(),
        windows,
    }
}
