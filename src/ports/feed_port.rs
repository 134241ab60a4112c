//! Market data port trait.

use crate::domain::error::QuorumError;
use crate::domain::interval::SamplingInterval;
use crate::domain::ohlcv::PriceSeries;

pub trait PriceFeedPort: Send + Sync {
    /// The trailing `candles` bars of `ticker` at `interval`, oldest first.
    /// Fewer bars are returned when less history exists.
    fn fetch_series(
        &self,
        ticker: &str,
        interval: SamplingInterval,
        candles: usize,
    ) -> Result<PriceSeries, QuorumError>;

    fn latest_price(&self, ticker: &str) -> Result<f64, QuorumError>;
}
