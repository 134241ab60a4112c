//! EMA trend component.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Score = clamp(sensitivity * (C - EMA) / EMA, -1, 1).
//! Fewer than n closes score 0.

use crate::domain::component::{closes, ScoringComponent};
use crate::domain::error::QuorumError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::settings::{self, Settings};

pub const NAME: &str = "ema";

#[derive(Debug, Clone, PartialEq)]
pub struct EmaTrend {
    pub period: usize,
    pub sensitivity: f64,
}

impl EmaTrend {
    pub fn from_settings(settings: &Settings) -> Result<Self, QuorumError> {
        Ok(Self {
            period: settings::get_usize(settings, NAME, "period", 20)?,
            sensitivity: settings::get_f64(settings, NAME, "sensitivity", 10.0)?,
        })
    }
}

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    for &close in &values[period..] {
        ema = close * k + ema * (1.0 - k);
    }
    Some(ema)
}

impl ScoringComponent for EmaTrend {
    fn score(&self, bars: &[OhlcvBar]) -> Result<f64, QuorumError> {
        let closes = closes(bars, NAME)?;
        let (Some(ema), Some(&last)) = (ema(&closes, self.period), closes.last()) else {
            return Ok(0.0);
        };
        if ema == 0.0 {
            return Ok(0.0);
        }
        Ok((self.sensitivity * (last - ema) / ema).clamp(-1.0, 1.0))
    }

    fn lookback(&self) -> usize {
        self.period * 3
    }
}
