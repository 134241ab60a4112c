//! Sampling intervals for price series.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::QuorumError;

pub const MINUTES_PER_DAY: u32 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SamplingInterval {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Day1,
    Week1,
}

impl SamplingInterval {
    pub const ALL: [SamplingInterval; 8] = [
        SamplingInterval::Minute1,
        SamplingInterval::Minute5,
        SamplingInterval::Minute15,
        SamplingInterval::Minute30,
        SamplingInterval::Hour1,
        SamplingInterval::Hour4,
        SamplingInterval::Day1,
        SamplingInterval::Week1,
    ];

    /// Interval length in minutes, the common base unit used to align series.
    pub fn minutes(self) -> u32 {
        match self {
            SamplingInterval::Minute1 => 1,
            SamplingInterval::Minute5 => 5,
            SamplingInterval::Minute15 => 15,
            SamplingInterval::Minute30 => 30,
            SamplingInterval::Hour1 => 60,
            SamplingInterval::Hour4 => 240,
            SamplingInterval::Day1 => MINUTES_PER_DAY,
            SamplingInterval::Week1 => 7 * MINUTES_PER_DAY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SamplingInterval::Minute1 => "1m",
            SamplingInterval::Minute5 => "5m",
            SamplingInterval::Minute15 => "15m",
            SamplingInterval::Minute30 => "30m",
            SamplingInterval::Hour1 => "1h",
            SamplingInterval::Hour4 => "4h",
            SamplingInterval::Day1 => "1d",
            SamplingInterval::Week1 => "1w",
        }
    }

    /// Number of candles of this interval covering `days` days (at least one).
    pub fn candles_in_days(self, days: u32) -> usize {
        let total = days as u64 * MINUTES_PER_DAY as u64;
        ((total / self.minutes() as u64) as usize).max(1)
    }
}

impl fmt::Display for SamplingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SamplingInterval {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SamplingInterval::ALL
            .into_iter()
            .find(|i| i.label() == wanted)
            .ok_or_else(|| QuorumError::ConfigInvalid {
                section: "component".into(),
                key: "interval".into(),
                reason: format!("unknown sampling interval '{}'", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_are_strictly_increasing() {
        let minutes: Vec<u32> = SamplingInterval::ALL.iter().map(|i| i.minutes()).collect();
        assert!(minutes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn parse_labels() {
        for interval in SamplingInterval::ALL {
            assert_eq!(interval.label().parse::<SamplingInterval>().unwrap(), interval);
        }
        assert_eq!(" 1H ".parse::<SamplingInterval>().unwrap(), SamplingInterval::Hour1);
        assert!("2h".parse::<SamplingInterval>().is_err());
    }

    #[test]
    fn candles_in_days() {
        assert_eq!(SamplingInterval::Hour1.candles_in_days(2), 48);
        assert_eq!(SamplingInterval::Day1.candles_in_days(10), 10);
        assert_eq!(SamplingInterval::Minute15.candles_in_days(1), 96);
        // A week bar over a three day horizon still yields one candle.
        assert_eq!(SamplingInterval::Week1.candles_in_days(3), 1);
    }
}
