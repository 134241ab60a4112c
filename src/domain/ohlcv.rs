//! OHLCV bar and price series representation.

use chrono::NaiveDateTime;

use crate::domain::interval::SamplingInterval;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// All four prices are finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Bars for one ticker at one sampling interval, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub interval: SamplingInterval,
    pub bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, interval: SamplingInterval, bars: Vec<OhlcvBar>) -> Self {
        Self {
            ticker: ticker.into(),
            interval,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The first `count` bars, capped at the series length.
    pub fn prefix(&self, count: usize) -> &[OhlcvBar] {
        &self.bars[..count.min(self.bars.len())]
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}
