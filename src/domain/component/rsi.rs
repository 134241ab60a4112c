//! RSI mean-reversion component.
//!
//! Uses Wilder's smoothing for average gain/loss:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)), 100 when avg_loss == 0.
//! Score = (50 - RSI) / 50, so oversold is a buy and overbought a sell.
//! Fewer than n + 1 closes score 0.

use crate::domain::component::{closes, ScoringComponent};
use crate::domain::error::QuorumError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::settings::{self, Settings};

pub const NAME: &str = "rsi";

#[derive(Debug, Clone, PartialEq)]
pub struct RsiReversion {
    pub period: usize,
}

impl RsiReversion {
    pub fn from_settings(settings: &Settings) -> Result<Self, QuorumError> {
        Ok(Self {
            period: settings::get_usize(settings, NAME, "period", 14)?,
        })
    }
}

pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        Some(100.0)
    } else {
        Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
    }
}

impl ScoringComponent for RsiReversion {
    fn score(&self, bars: &[OhlcvBar]) -> Result<f64, QuorumError> {
        let closes = closes(bars, NAME)?;
        Ok(rsi(&closes, self.period)
            .map(|r| ((50.0 - r) / 50.0).clamp(-1.0, 1.0))
            .unwrap_or(0.0))
    }

    fn lookback(&self) -> usize {
        self.period * 4
    }
}
