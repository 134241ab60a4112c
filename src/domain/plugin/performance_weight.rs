//! BEFORE_EVALUATION plugin that reweights components by recent performance.
//!
//! Each binding is replayed on its own over the trailing `window` candles of
//! its slice: all-in when its weighted score reaches the buy limit, all-out
//! when it reaches the sell limit. The resulting return ratios redistribute
//! the sum of absolute weights; each weight keeps its sign. Bindings with
//! fewer than two candles in the window keep their weight and take no share.

use std::collections::BTreeMap;

use log::debug;

use crate::domain::component::ScoringComponent;
use crate::domain::confidence::{ConfidenceTable, Order};
use crate::domain::error::QuorumError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::plugin::{PluginContext, TablePlugin};
use crate::domain::settings::{self, Settings};
use crate::domain::trade_agent::{apply_order, Ledger, PriceMap};

pub const NAME: &str = "performance_weight";

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceWeight {
    pub window: usize,
}

impl PerformanceWeight {
    pub fn from_settings(settings: &Settings) -> Result<Self, QuorumError> {
        Ok(Self {
            window: settings::get_usize(settings, NAME, "window", 100)?,
        })
    }
}

/// Ratio of final to starting value when trading `ticker` on the weighted
/// score of `component` over `bars[start..]`.
pub fn replay_single(
    component: &dyn ScoringComponent,
    weight: f64,
    ticker: &str,
    bars: &[OhlcvBar],
    start: usize,
    buy_limit: f64,
    sell_limit: f64,
) -> Result<f64, QuorumError> {
    let mut ledger = Ledger::new(1.0);
    let mut prices = PriceMap::new();
    for end in (start + 1)..=bars.len() {
        let history = &bars[..end];
        let score = component.score(history)? * weight;
        prices.insert(ticker.to_string(), history[end - 1].close);

        let mut order = Order::new();
        if score >= buy_limit {
            order.set(ticker, 1.0);
        } else if score <= sell_limit {
            order.set(ticker, -1.0);
        }
        ledger = apply_order(&ledger, &order, &prices);
    }
    Ok(ledger.liquidation_value(&prices))
}

impl TablePlugin for PerformanceWeight {
    fn run(&self, ctx: &mut PluginContext<'_>, table: ConfidenceTable) -> Result<ConfidenceTable, QuorumError> {
        let mut ratios: BTreeMap<usize, f64> = BTreeMap::new();
        for (idx, binding) in ctx.components.iter().enumerate() {
            let (Some(component), Some(bars)) = (binding.instance(), ctx.slices.get(&binding.id())) else {
                continue;
            };
            let start = bars.len().saturating_sub(self.window);
            if bars.len() - start < 2 {
                continue;
            }
            let ratio = replay_single(
                component,
                binding.record.weight,
                &binding.record.ticker,
                bars,
                start,
                ctx.buy_limit,
                ctx.sell_limit,
            )?;
            ratios.insert(idx, ratio.max(0.0));
        }

        let ratio_total: f64 = ratios.values().sum();
        if ratios.is_empty() || ratio_total <= 0.0 {
            return Ok(table);
        }
        let weight_total: f64 = ratios
            .keys()
            .map(|&idx| ctx.components[idx].record.weight.abs())
            .sum();

        for (idx, ratio) in ratios {
            let binding = &mut ctx.components[idx];
            let sign = if binding.record.weight < 0.0 { -1.0 } else { 1.0 };
            let weight = sign * weight_total * ratio / ratio_total;
            debug!(
                "{}: component {} weight {:.4} -> {:.4}",
                ctx.profile,
                binding.id(),
                binding.record.weight,
                weight
            );
            binding.record.weight = weight;
        }
        Ok(table)
    }
}
