// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_n = (x_{t-n+1} + ... + x_t) / n
//
// Only the trailing `period` values contribute; older history is ignored.
// =============================================================================

/// Arithmetic mean of the last `period` elements of `series`.
///
/// Returns `None` when:
/// - `period == 0` (division guard)
/// - `series.len() < period`
/// - the mean is non-finite
pub fn sma(series: &[f64], period: usize) -> Option<f64> {
    if period == 0 || series.len() < period {
        return None;
    }

    let window = &series[series.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

/// Percentage spread of the short average over the long one.
///
/// `None` when either average is missing or the long average is zero.
pub fn ma_difference_pct(short: Option<f64>, long: Option<f64>) -> Option<f64> {
    let (short, long) = (short?, long?);
    if long == 0.0 {
        return None;
    }
    let diff = (short - long) / long * 100.0;
    diff.is_finite().then_some(diff)
}
