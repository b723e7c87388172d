// =============================================================================
// Data-Ready Poller
// =============================================================================
//
// The feed fills the bar buffer asynchronously after the market is set. The
// poller checks it at a fixed interval (no backoff) and gives up after a fixed
// number of attempts.
// =============================================================================

use std::time::Duration;

use tracing::info;

use crate::error::BotError;
use crate::feed::BarSource;
use crate::market_data::BarSeries;

/// Polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub min_bars: usize,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            min_bars: 1,
            interval: Duration::from_millis(2000),
            max_attempts: 10,
        }
    }
}

/// Wait until `source` holds at least `min_bars` bars and return a snapshot.
///
/// Each attempt sleeps `interval` first, then checks. Fails with
/// [`BotError::DataTimeout`] once `max_attempts` checks came up short.
pub async fn await_bars<S: BarSource + ?Sized>(
    source: &S,
    settings: PollSettings,
) -> Result<BarSeries, BotError> {
    info!(min_bars = settings.min_bars, "waiting for candle data");

    let mut attempts = 0;
    while attempts < settings.max_attempts {
        tokio::time::sleep(settings.interval).await;

        let count = source.bar_count();
        if count >= settings.min_bars {
            let series = source.snapshot();
            info!(candles = series.len(), "candle data loaded");
            return Ok(series);
        }

        attempts += 1;
        info!(
            attempt = attempts,
            max_attempts = settings.max_attempts,
            "still waiting for data"
        );
    }

    Err(BotError::DataTimeout { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Bar;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `len` bars starting from the `ready_on`-th check (1-based).
    struct FillingSource {
        checks: AtomicUsize,
        ready_on: usize,
        len: usize,
    }

    impl FillingSource {
        fn new(ready_on: usize, len: usize) -> Self {
            Self {
                checks: AtomicUsize::new(0),
                ready_on,
                len,
            }
        }

        fn checks(&self) -> usize {
            self.checks.load(Ordering::SeqCst)
        }
    }

    impl BarSource for FillingSource {
        fn bar_count(&self) -> usize {
            let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_on {
                self.len
            } else {
                0
            }
        }

        fn snapshot(&self) -> BarSeries {
            BarSeries::new(vec![Bar::default(); self.len])
        }
    }

    fn fast(min_bars: usize, max_attempts: u32) -> PollSettings {
        PollSettings {
            min_bars,
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn returns_on_first_ready_check() {
        let source = FillingSource::new(3, 5);
        let series = await_bars(&source, fast(1, 10)).await.unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(source.checks(), 3);
    }

    #[tokio::test]
    async fn ready_immediately() {
        let source = FillingSource::new(1, 2);
        await_bars(&source, fast(2, 10)).await.unwrap();
        assert_eq!(source.checks(), 1);
    }

    #[tokio::test]
    async fn below_min_bars_keeps_waiting() {
        // Buffer fills on the second check but never reaches 10 bars.
        let source = FillingSource::new(2, 4);
        let err = await_bars(&source, fast(10, 5)).await.unwrap_err();
        assert!(matches!(err, BotError::DataTimeout { attempts: 5 }));
        assert_eq!(source.checks(), 5);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let source = FillingSource::new(usize::MAX, 1);
        let err = await_bars(&source, fast(1, 10)).await.unwrap_err();
        assert!(matches!(err, BotError::DataTimeout { attempts: 10 }));
        assert_eq!(source.checks(), 10);
    }

    #[test]
    fn defaults() {
        let s = PollSettings::default();
        assert_eq!(s.min_bars, 1);
        assert_eq!(s.interval, Duration::from_secs(2));
        assert_eq!(s.max_attempts, 10);
    }
}
