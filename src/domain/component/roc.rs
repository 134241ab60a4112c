//! Momentum component on the rate of change.
//!
//! ROC(n) = (C[last] - C[last-n]) / C[last-n], 0 when C[last-n] == 0.
//! Score = clamp(sensitivity * ROC, -1, 1).

use crate::domain::component::{closes, ScoringComponent};
use crate::domain::error::QuorumError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::settings::{self, Settings};

pub const NAME: &str = "roc";

#[derive(Debug, Clone, PartialEq)]
pub struct Momentum {
    pub period: usize,
    pub sensitivity: f64,
}

impl Momentum {
    pub fn from_settings(settings: &Settings) -> Result<Self, QuorumError> {
        Ok(Self {
            period: settings::get_usize(settings, NAME, "period", 10)?,
            sensitivity: settings::get_f64(settings, NAME, "sensitivity", 5.0)?,
        })
    }
}

impl ScoringComponent for Momentum {
    fn score(&self, bars: &[OhlcvBar]) -> Result<f64, QuorumError> {
        let closes = closes(bars, NAME)?;
        if closes.len() <= self.period {
            return Ok(0.0);
        }
        let last = closes[closes.len() - 1];
        let prev = closes[closes.len() - 1 - self.period];
        if prev == 0.0 {
            return Ok(0.0);
        }
        Ok((self.sensitivity * (last - prev) / prev).clamp(-1.0, 1.0))
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }
}
