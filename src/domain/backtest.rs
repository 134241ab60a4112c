//! Multi-interval historical replay.
//!
//! Every binding gets its own series at its own interval. Time advances in
//! steps of the finest interval; at step `i` a binding sees the first
//! `floor(i * min_minutes / its_minutes)` bars of its series, so coarser
//! series grow more slowly and never show a bar from the future.
//! Each step's order is applied to a simulated [`Ledger`] and the ledger is
//! valued at the last close of the finest series per ticker.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::domain::binding::BindingId;
use crate::domain::confidence::Order;
use crate::domain::error::QuorumError;
use crate::domain::interval::SamplingInterval;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::plugin::SliceMap;
use crate::domain::trade_agent::{apply_order, Ledger, PriceMap};

/// How much history a backtest replays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Horizon {
    Days(u32),
    /// Candles of the finest interval among the bindings.
    Candles(usize),
}

impl Horizon {
    /// Candles to fetch at `interval` when the finest interval is `finest`.
    pub fn candles_at(self, interval: SamplingInterval, finest: SamplingInterval) -> usize {
        match self {
            Horizon::Days(days) => interval.candles_in_days(days),
            Horizon::Candles(n) => {
                let minutes = n as u64 * finest.minutes() as u64;
                minutes.div_ceil(interval.minutes() as u64) as usize
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub starting_balance: f64,
    pub partitions: usize,
    pub horizon: Horizon,
}

/// Ratio of liquidation value at each checkpoint to the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetWorthHistory(Vec<f64>);

impl NetWorthHistory {
    pub fn entries(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compounded return over the whole run.
    pub fn total_return(&self) -> f64 {
        self.0.iter().product()
    }

    fn push(&mut self, value: f64, prior: f64) {
        self.0.push(if prior > 0.0 { value / prior } else { 0.0 });
    }
}

/// Outcome of a replay: the history plus the final ledger and prices.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub history: NetWorthHistory,
    pub final_ledger: Ledger,
    pub final_value: f64,
}

/// Replay `series` (one per binding) through `evaluate`.
///
/// `evaluate` gets the step's slices and the simulated ledger and returns the
/// order to apply.
pub fn replay<F>(
    request: &BacktestRequest,
    series: &[(BindingId, PriceSeries)],
    mut evaluate: F,
) -> Result<BacktestReport, QuorumError>
where
    F: FnMut(&SliceMap<'_>, &Ledger) -> Result<Order, QuorumError>,
{
    let max_candles = series.iter().map(|(_, s)| s.len()).max().unwrap_or(0);
    if max_candles == 0 {
        let (ticker, interval) = series
            .first()
            .map(|(_, s)| (s.ticker.clone(), s.interval.to_string()))
            .unwrap_or_else(|| ("*".to_string(), "*".to_string()));
        return Err(QuorumError::NoData { ticker, interval });
    }

    let min_minutes = series
        .iter()
        .map(|(_, s)| s.interval.minutes() as usize)
        .min()
        .unwrap_or(1);
    let partition_size = max_candles.div_ceil(request.partitions.max(1));

    // Price source per ticker: its finest series, first binding on ties.
    let mut pricing: BTreeMap<&str, &PriceSeries> = BTreeMap::new();
    for (_, s) in series {
        let finer = pricing
            .get(s.ticker.as_str())
            .is_none_or(|current| s.interval.minutes() < current.interval.minutes());
        if finer {
            pricing.insert(s.ticker.as_str(), s);
        }
    }

    info!(
        "backtest over {} steps, partition size {}, {} series",
        max_candles,
        partition_size,
        series.len()
    );

    let mut ledger = Ledger::new(request.starting_balance);
    let mut prior = request.starting_balance;
    let mut history = NetWorthHistory::default();
    let mut prices = PriceMap::new();
    let mut value = prior;

    for i in 0..max_candles {
        let visible = |s: &PriceSeries| i * min_minutes / s.interval.minutes() as usize;
        let slices: SliceMap<'_> = series
            .iter()
            .map(|(id, s)| (*id, s.prefix(visible(s))))
            .collect();

        let order = evaluate(&slices, &ledger)?;

        for (ticker, s) in &pricing {
            if let Some(bar) = s.prefix(visible(s)).last() {
                prices.insert(ticker.to_string(), bar.close);
            }
        }
        ledger = apply_order(&ledger, &order, &prices);
        value = ledger.liquidation_value(&prices);

        if (i + 1) % partition_size == 0 {
            history.push(value, prior);
            debug!("checkpoint at step {}: value {:.4}", i + 1, value);
            prior = value;
        }
    }
    if max_candles % partition_size != 0 {
        history.push(value, prior);
    }

    Ok(BacktestReport {
        history,
        final_ledger: ledger,
        final_value: value,
    })
}
