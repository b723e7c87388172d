// =============================================================================
// Reporter — human-readable technical analysis summary
// =============================================================================
//
// Rounding happens here and nowhere else: prices to 2 dp, the price position
// to 1 dp. A missing value renders as `N/A`.
// =============================================================================

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::error::BotError;
use crate::market_data::Bar;
use crate::types::{ResolvedSymbol, Signal};

const MISSING: &str = "N/A";

/// Everything the primary flow produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub resolved: ResolvedSymbol,
    pub analysis: Analysis,
    /// Most recent raw bar, for the candle timestamp line.
    pub last_bar: Option<Bar>,
}

fn price(v: Option<f64>) -> String {
    v.map_or_else(|| MISSING.to_string(), |p| format!("{p:.2}"))
}

fn percent(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| MISSING.to_string(), |p| format!("{p:.decimals$}%"))
}

/// Write `report` to `out`.
pub fn write_report<W: Write + ?Sized>(out: &mut W, report: &Report) -> Result<(), BotError> {
    let a = &report.analysis;
    let w = a.windows;

    writeln!(out)?;
    writeln!(out, "{} Technical Analysis:", report.resolved.symbol)?;
    writeln!(out, "Current Level: {}", price(a.last_price))?;
    writeln!(out, "Short MA ({}): {}", w.short, price(a.short_ma))?;
    writeln!(out, "Long MA ({}): {}", w.long, price(a.long_ma))?;
    writeln!(out, "Total Candles: {}", a.closes)?;
    writeln!(out, "Symbol Used: {}", report.resolved.symbol)?;

    match a.signal {
        Signal::InsufficientData => {
            writeln!(out, "Insufficient data for analysis")?;
            writeln!(out, "   Need at least {} candles, have {}", w.long, a.closes)?;
        }
        signal => {
            writeln!(out, "MA Difference: {}", percent(a.ma_difference_pct, 2))?;
            match signal {
                Signal::Buy => writeln!(out, "{signal} SIGNAL - Short MA above Long MA")?,
                Signal::Sell => writeln!(out, "{signal} SIGNAL - Short MA below Long MA")?,
                _ => writeln!(out, "{signal} - MAs are equal")?,
            }
            if signal != Signal::Neutral {
                writeln!(out, "   Entry Level: {}", price(a.last_price))?;
            }
        }
    }

    writeln!(out)?;
    if a.recent_high.is_some() {
        writeln!(
            out,
            "Price Position ({}-period): {}",
            w.position,
            percent(a.price_position_pct, 1)
        )?;
        writeln!(out, "   Recent High: {}", price(a.recent_high))?;
        writeln!(out, "   Recent Low: {}", price(a.recent_low))?;
    } else {
        writeln!(out, "Insufficient data for price position analysis")?;
    }

    if let Some(ts) = report.last_bar.as_ref().and_then(Bar::timestamp) {
        writeln!(out, "Last Candle: {}", ts.to_rfc3339())?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisWindows};
    use crate::market_data::BarSeries;
    use crate::types::ResolutionTier;

    fn series(closes: &[f64]) -> BarSeries {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: Some(1_700_000_000.0 + i as f64 * 3600.0),
                open: Some(c),
                high: Some(c + 1.0),
                low: Some(c - 1.0),
                close: Some(c),
                volume: Some(1.0),
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn render(s: &BarSeries) -> String {
        let report = Report {
            resolved: ResolvedSymbol {
                symbol: "NSE:NIFTY".into(),
                tier: ResolutionTier::Candidate,
            },
            analysis: analyze(s, AnalysisWindows::default()),
            last_bar: s.last().cloned(),
        };
        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn buy_report() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let text = render(&series(&closes));

        assert!(text.contains("NSE:NIFTY Technical Analysis:"));
        assert!(text.contains("Current Level: 60.00"));
        assert!(text.contains("Short MA (10): 55.50"));
        assert!(text.contains("Long MA (50): 35.50"));
        assert!(text.contains("Total Candles: 60"));
        assert!(text.contains("MA Difference: 56.34%"));
        assert!(text.contains("BUY SIGNAL - Short MA above Long MA"));
        assert!(text.contains("Entry Level: 60.00"));
        // (60 - 40) / (61 - 40) * 100 = 95.238...
        assert!(text.contains("Price Position (20-period): 95.2%"));
        assert!(text.contains("Recent High: 61.00"));
        assert!(text.contains("Recent Low: 40.00"));
        assert!(text.contains("Last Candle: 2023-11-17T09:13:20+00:00"));
    }

    #[test]
    fn neutral_report_has_no_entry_level() {
        let text = render(&series(&[100.0; 60]));
        assert!(text.contains("NEUTRAL - MAs are equal"));
        assert!(!text.contains("Entry Level"));
        assert!(text.contains("MA Difference: 0.00%"));
    }

    #[test]
    fn missing_values_render_as_na() {
        let text = render(&series(&[5.0, 6.0, 7.0]));
        assert!(text.contains("Current Level: 7.00"));
        assert!(text.contains("Short MA (10): N/A"));
        assert!(text.contains("Long MA (50): N/A"));
        assert!(text.contains("Need at least 50 candles, have 3"));
        assert!(text.contains("Insufficient data for price position analysis"));
    }

    #[test]
    fn empty_series_renders() {
        let text = render(&BarSeries::default());
        assert!(text.contains("Current Level: N/A"));
        assert!(!text.contains("Last Candle"));
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_failure_is_reporting_error() {
        let s = series(&[1.0]);
        let report = Report {
            resolved: ResolvedSymbol {
                symbol: "X".into(),
                tier: ResolutionTier::Basic,
            },
            analysis: analyze(&s, AnalysisWindows::default()),
            last_bar: None,
        };
        let err = write_report(&mut BrokenSink, &report).unwrap_err();
        assert!(matches!(err, BotError::Reporting(_)));
    }
}
