use parking_lot::RwLock;

use super::bar::Bar;
use super::bar_series::BarSeries;

// ---------------------------------------------------------------------------
// BarBuffer -- live candle buffer for one chart subscription
// ---------------------------------------------------------------------------

/// Thread-safe buffer written by the feed task and read by the poller.
///
/// The live (unclosed) candle is continuously updated in-place: an update
/// whose `time` matches the last stored bar replaces it, anything else is
/// appended. Readers take a [`BarSeries`] snapshot so analysis never sees a
/// half-applied update.
#[derive(Debug, Default)]
pub struct BarBuffer {
    bars: RwLock<Vec<Bar>>,
}

impl BarBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new bar or replace the in-progress one.
    pub fn upsert(&self, bar: Bar) {
        let mut bars = self.bars.write();
        if let Some(last) = bars.last() {
            if last.time.is_some() && last.time == bar.time {
                bars.pop();
            }
        }
        bars.push(bar);
    }

    /// Apply a batch of updates in order.
    pub fn extend(&self, batch: impl IntoIterator<Item = Bar>) {
        for bar in batch {
            self.upsert(bar);
        }
    }

    /// Drop everything, e.g. when the chart switches to another market.
    pub fn clear(&self) {
        self.bars.write().clear();
    }

    /// Number of bars stored, including any in-progress bar.
    pub fn len(&self) -> usize {
        self.bars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.read().is_empty()
    }

    /// Copy the current contents into an immutable series.
    pub fn snapshot(&self) -> BarSeries {
        BarSeries::new(self.bars.read().clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
