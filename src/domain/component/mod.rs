//! Scoring components.
//!
//! A scoring component maps a price slice ending at the evaluation instant to
//! a single score. Scores are conventionally in [-1, 1] with positive meaning
//! "buy", but the pipeline only relies on them being finite; the binding
//! weight scales them afterwards.
//!
//! Built-ins:
//! - [`ema::EmaTrend`] (`ema`): distance of the close from its EMA
//! - [`rsi::RsiReversion`] (`rsi`): mean reversion on Wilder's RSI
//! - [`roc::Momentum`] (`roc`): rate of change over a fixed period

pub mod ema;
pub mod roc;
pub mod rsi;

use crate::domain::error::QuorumError;
use crate::domain::ohlcv::OhlcvBar;

pub trait ScoringComponent: Send {
    /// Score the slice. Too little history is a neutral `0.0`, malformed
    /// bars are an error.
    fn score(&self, bars: &[OhlcvBar]) -> Result<f64, QuorumError>;

    /// Number of trailing candles the component wants in live evaluation.
    fn lookback(&self) -> usize;
}

/// Closing prices of `bars`, rejecting malformed bars.
pub(crate) fn closes(bars: &[OhlcvBar], component: &str) -> Result<Vec<f64>, QuorumError> {
    bars.iter()
        .map(|bar| {
            if bar.is_well_formed() {
                Ok(bar.close)
            } else {
                Err(QuorumError::Scoring {
                    component: component.to_string(),
                    reason: format!("malformed bar at {}", bar.timestamp),
                })
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    pub fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                timestamp: start + chrono::Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_bars;
    use super::*;

    #[test]
    fn closes_extracts_in_order() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        assert_eq!(closes(&bars, "x").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn closes_rejects_malformed_bar() {
        let mut bars = make_bars(&[1.0, 2.0]);
        bars[1].close = f64::INFINITY;
        match closes(&bars, "ema") {
            Err(QuorumError::Scoring { component, .. }) => assert_eq!(component, "ema"),
            other => panic!("expected Scoring error, got {other:?}"),
        }
    }
}
