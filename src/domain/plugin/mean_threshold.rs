//! Reference CREATE_ORDER policy.
//!
//! Per ticker, the mean of its scores:
//! - mean >= buy_limit: buy `mean / sum of qualifying means`
//! - mean <= sell_limit: sell `max(mean, -1)`
//! - otherwise hold (ticker left out of the order)
//! Tickers with no scores are held.

use crate::domain::confidence::{ConfidenceTable, Order};
use crate::domain::error::QuorumError;
use crate::domain::plugin::{OrderPlugin, PluginContext};

pub const NAME: &str = "mean_threshold";

#[derive(Debug, Clone, Default)]
pub struct MeanThreshold;

impl OrderPlugin for MeanThreshold {
    fn create_order(&self, ctx: &PluginContext<'_>, table: ConfidenceTable) -> Result<Order, QuorumError> {
        let means: Vec<(&str, f64)> = table
            .tickers()
            .filter_map(|ticker| table.mean(ticker).map(|m| (ticker, m)))
            .filter(|(_, m)| m.is_finite())
            .collect();

        let buy_total: f64 = means
            .iter()
            .filter(|(_, m)| *m >= ctx.buy_limit)
            .map(|(_, m)| m)
            .sum();

        let mut order = Order::new();
        for (ticker, mean) in means {
            if mean >= ctx.buy_limit {
                if buy_total > 0.0 {
                    order.set(ticker, mean / buy_total);
                }
            } else if mean <= ctx.sell_limit {
                order.set(ticker, mean.max(-1.0));
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::confidence::SignalKey;
    use crate::domain::plugin::SliceMap;

    fn run(table: ConfidenceTable, buy_limit: f64, sell_limit: f64) -> Order {
        let slices = SliceMap::new();
        let ctx = PluginContext {
            profile: "test",
            binding_id: 1,
            buy_limit,
            sell_limit,
            components: &mut [],
            slices: &slices,
        };
        MeanThreshold.create_order(&ctx, table).unwrap()
    }

    #[test]
    fn single_qualifier_gets_full_allocation() {
        let mut table = ConfidenceTable::new();
        table.insert("X", SignalKey::Component(1), 0.8);
        let order = run(table, 0.5, -0.5);
        assert_eq!(order.len(), 1);
        assert!((order.get("X").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn below_buy_limit_is_held() {
        let mut table = ConfidenceTable::new();
        table.insert("X", SignalKey::Component(1), 0.6);
        table.insert("Y", SignalKey::Component(2), 0.3);
        let order = run(table, 0.5, -0.5);
        assert_eq!(order.len(), 1);
        assert!((order.get("X").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(order.get("Y"), None);
    }

    #[test]
    fn buys_split_proportionally() {
        let mut table = ConfidenceTable::new();
        table.insert("A", SignalKey::Component(1), 0.9);
        table.insert("B", SignalKey::Component(2), 0.6);
        let order = run(table, 0.5, -0.5);
        assert!((order.get("A").unwrap() - 0.6).abs() < 1e-12);
        assert!((order.get("B").unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn sells_use_raw_mean_clamped() {
        let mut table = ConfidenceTable::new();
        table.insert("A", SignalKey::Component(1), -0.7);
        table.insert("B", SignalKey::Component(2), -3.0);
        let order = run(table, 0.5, -0.5);
        assert!((order.get("A").unwrap() + 0.7).abs() < 1e-12);
        assert_eq!(order.get("B"), Some(-1.0));
    }

    #[test]
    fn mean_over_components_decides() {
        let mut table = ConfidenceTable::new();
        table.insert("A", SignalKey::Component(1), 1.0);
        table.insert("A", SignalKey::Component(2), -0.2);
        // mean 0.4 < 0.5
        let order = run(table, 0.5, -0.5);
        assert!(order.is_empty());
    }

    #[test]
    fn empty_rows_are_held() {
        let mut table = ConfidenceTable::new();
        table.ensure_ticker("A");
        assert!(run(table, 0.5, -0.5).is_empty());
    }
}
