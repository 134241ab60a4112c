//! CSV file price feed.
//!
//! One file per ticker and interval, `<TICKER>_<interval>.csv`, with the
//! header `timestamp,open,high,low,close,volume`. Timestamps are
//! `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date.

use crate::domain::error::QuorumError;
use crate::domain::interval::SamplingInterval;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::ports::feed_port::PriceFeedPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub struct CsvPriceFeed {
    base_path: PathBuf,
}

impl CsvPriceFeed {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, interval: SamplingInterval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", ticker, interval.label()))
    }

    /// Every bar of a file, sorted oldest first.
    pub fn load(&self, ticker: &str, interval: SamplingInterval) -> Result<Vec<OhlcvBar>, QuorumError> {
        let path = self.csv_path(ticker, interval);
        let content = fs::read_to_string(&path).map_err(|e| QuorumError::NoData {
            ticker: ticker.to_string(),
            interval: format!("{} ({}: {})", interval, path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| QuorumError::NoData {
                ticker: ticker.to_string(),
                interval: format!("{} (CSV parse error on row {}: {})", interval, line + 1, e),
            })?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| QuorumError::NoData {
                ticker: ticker.to_string(),
                interval: format!("{} (invalid timestamp '{}')", interval, row.timestamp),
            })?;
            bars.push(OhlcvBar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

impl PriceFeedPort for CsvPriceFeed {
    fn fetch_series(
        &self,
        ticker: &str,
        interval: SamplingInterval,
        candles: usize,
    ) -> Result<PriceSeries, QuorumError> {
        let mut bars = self.load(ticker, interval)?;
        let skip = bars.len().saturating_sub(candles);
        bars.drain(..skip);
        Ok(PriceSeries::new(ticker, interval, bars))
    }

    /// Last close of the finest interval file present for `ticker`.
    fn latest_price(&self, ticker: &str) -> Result<f64, QuorumError> {
        let interval = SamplingInterval::ALL
            .into_iter()
            .find(|i| self.csv_path(ticker, *i).exists())
            .ok_or_else(|| QuorumError::NoPrice {
                ticker: ticker.to_string(),
                reason: format!("no price file under {}", self.base_path.display()),
            })?;
        self.load(ticker, interval)?
            .last()
            .map(|b| b.close)
            .ok_or_else(|| QuorumError::NoPrice {
                ticker: ticker.to_string(),
                reason: format!("{} file is empty", interval),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let hourly = "timestamp,open,high,low,close,volume\n\
            2024-01-15 02:00:00,102.0,104.0,101.0,103.0,700\n\
            2024-01-15 00:00:00,100.0,110.0,90.0,105.0,500\n\
            2024-01-15 01:00:00,105.0,115.0,100.0,110.0,600\n";
        fs::write(path.join("BTC_1h.csv"), hourly).unwrap();
        fs::write(
            path.join("BTC_1d.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-14,90.0,99.0,89.0,98.0,10000\n",
        )
        .unwrap();
        fs::write(path.join("ETH_1h.csv"), "timestamp,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join("BAD_1h.csv"),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_series_sorts_and_keeps_trailing_candles() {
        let (_dir, path) = setup_test_data();
        let feed = CsvPriceFeed::new(path);

        let series = feed.fetch_series("BTC", SamplingInterval::Hour1, 2).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].close, 110.0);
        assert_eq!(series.bars[1].close, 103.0);
        assert_eq!(series.bars[1].volume, 700.0);

        let all = feed.fetch_series("BTC", SamplingInterval::Hour1, 100).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn bare_dates_parse_as_midnight() {
        let (_dir, path) = setup_test_data();
        let feed = CsvPriceFeed::new(path);
        let series = feed.fetch_series("BTC", SamplingInterval::Day1, 5).unwrap();
        assert_eq!(series.bars[0].timestamp.to_string(), "2024-01-14 00:00:00");
    }

    #[test]
    fn latest_price_uses_finest_interval() {
        let (_dir, path) = setup_test_data();
        let feed = CsvPriceFeed::new(path);
        assert_eq!(feed.latest_price("BTC").unwrap(), 103.0);
    }

    #[test]
    fn missing_and_empty_files() {
        let (_dir, path) = setup_test_data();
        let feed = CsvPriceFeed::new(path);
        assert!(matches!(
            feed.fetch_series("XYZ", SamplingInterval::Hour1, 5),
            Err(QuorumError::NoData { .. })
        ));
        assert!(feed.fetch_series("ETH", SamplingInterval::Hour1, 5).unwrap().is_empty());
        assert!(matches!(feed.latest_price("ETH"), Err(QuorumError::NoPrice { .. })));
        assert!(matches!(feed.latest_price("XYZ"), Err(QuorumError::NoPrice { .. })));
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let (_dir, path) = setup_test_data();
        let feed = CsvPriceFeed::new(path);
        assert!(feed.fetch_series("BAD", SamplingInterval::Hour1, 5).is_err());
    }
}
