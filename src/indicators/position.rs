// =============================================================================
// Price Position — where the last price sits inside the recent range
// =============================================================================
//
//   position = (last - low_n) / (high_n - low_n) * 100
//
// 0 % means the price is at the n-period low, 100 % at the n-period high.

/// Highest high and lowest low over the trailing `period` entries.
///
/// `highs` and `lows` are independent series (bars missing one field are
/// already filtered out), so each is windowed separately.
pub fn recent_range(highs: &[f64], lows: &[f64], period: usize) -> Option<(f64, f64)> {
    if period == 0 || highs.len() < period || lows.len() < period {
        return None;
    }

    let high = highs[highs.len() - period..]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let low = lows[lows.len() - period..]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);

    (high.is_finite() && low.is_finite()).then_some((high, low))
}

/// Percentage position of `last` inside `[low, high]`.
///
/// Returns `None` when any input is missing or the range is degenerate
/// (`high == low`).
pub fn price_position(last: Option<f64>, high: Option<f64>, low: Option<f64>) -> Option<f64> {
    let (last, high, low) = (last?, high?, low?);
    if high == low {
        return None;
    }
    let pos = (last - low) / (high - low) * 100.0;
    pos.is_finite().then_some(pos)
}
