// =============================================================================
// BarSeries — immutable snapshot of the live buffer
// =============================================================================

use serde::{Deserialize, Serialize};

use super::bar::Bar;

/// Bars in arrival order (oldest first), frozen for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Most recent bar, if any.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close prices; bars without a resolvable close are skipped.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().filter_map(|b| b.close).collect()
    }

    /// High prices; bars without a resolvable high are skipped.
    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().filter_map(|b| b.high).collect()
    }

    /// Low prices; bars without a resolvable low are skipped.
    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().filter_map(|b| b.low).collect()
    }
}

impl From<Vec<Bar>> for BarSeries {
    fn from(bars: Vec<Bar>) -> Self {
        Self::new(bars)
    }
}
