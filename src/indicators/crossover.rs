// =============================================================================
// Moving-Average Crossover Signal
// =============================================================================

use crate::types::Signal;

/// Derive the crossover signal from a short and a long moving average.
///
/// Equality is exact: two averages that differ only in the last ulp are a
/// BUY or a SELL, never NEUTRAL.
pub fn derive_signal(short: Option<f64>, long: Option<f64>) -> Signal {
    let (Some(short), Some(long)) = (short, long) else {
        return Signal::InsufficientData;
    };

    if short > long {
        Signal::Buy
    } else if short < long {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
