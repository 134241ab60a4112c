//! Order application for live, paper and simulated ledgers.
//!
//! [`apply_order`] is the pure primitive shared by paper trading, the
//! backtest replay and the `performance_weight` plugin. [`TradeAgent`] wraps
//! it with the price feed, the broker and persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};

use crate::domain::confidence::Order;
use crate::domain::error::QuorumError;
use crate::domain::record::{ProfileId, ProfileUpdate, Wallet};
use crate::domain::status::ProfileStatus;
use crate::ports::broker_port::{BrokerPort, Fill};
use crate::ports::feed_port::PriceFeedPort;
use crate::ports::store_port::ProfileStore;

/// Fill costs within this of the balance are rounding, not overspending.
const SHORTFALL_TOLERANCE: f64 = 1e-9;

/// Ticker -> price used to value and execute an order.
pub type PriceMap = BTreeMap<String, f64>;

/// A balance and the quantities held against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub balance: f64,
    pub wallet: Wallet,
}

impl Ledger {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            wallet: Wallet::new(),
        }
    }

    pub fn with_wallet(balance: f64, wallet: Wallet) -> Self {
        Self { balance, wallet }
    }

    /// Balance plus every holding valued at `prices`. Holdings without a
    /// price count as zero.
    pub fn liquidation_value(&self, prices: &PriceMap) -> f64 {
        self.balance
            + self
                .wallet
                .iter()
                .filter_map(|(ticker, qty)| prices.get(ticker).map(|p| qty * p))
                .sum::<f64>()
    }

    fn add(&mut self, ticker: &str, quantity: f64) {
        let held = self.wallet.get(ticker).copied().unwrap_or(0.0) + quantity;
        if held > 0.0 {
            self.wallet.insert(ticker.to_string(), held);
        } else {
            self.wallet.remove(ticker);
        }
    }

    /// Book a broker fill. The balance stops at zero; the part of the cost
    /// it could not cover is returned.
    fn apply_fill(&mut self, fill: &Fill) -> f64 {
        self.add(&fill.ticker, fill.quantity);
        let remaining = self.balance - fill.quantity * fill.price;
        self.balance = remaining.max(0.0);
        (-remaining).max(0.0)
    }
}

/// Fraction clamped to [-1, 1]; `None` for zero or non-finite input.
fn effective_fraction(fraction: f64) -> Option<f64> {
    if !fraction.is_finite() || fraction == 0.0 {
        return None;
    }
    Some(fraction.clamp(-1.0, 1.0))
}

fn usable_price(prices: &PriceMap, ticker: &str) -> Option<f64> {
    prices.get(ticker).copied().filter(|p| p.is_finite() && *p > 0.0)
}

/// Apply `order` to `ledger` at `prices`.
///
/// Sells run first and free up balance; buys then spend
/// `min(budget * fraction, balance)` where `budget` is the post-sell
/// balance. Tickers without a usable price are skipped.
pub fn apply_order(ledger: &Ledger, order: &Order, prices: &PriceMap) -> Ledger {
    let mut next = ledger.clone();

    for (ticker, fraction) in order.iter() {
        let Some(f) = effective_fraction(fraction).filter(|f| *f < 0.0) else {
            continue;
        };
        let Some(price) = usable_price(prices, ticker) else {
            continue;
        };
        let held = next.wallet.get(ticker).copied().unwrap_or(0.0);
        let quantity = held * f.abs();
        if quantity <= 0.0 {
            continue;
        }
        next.add(ticker, -quantity);
        next.balance += quantity * price;
    }

    let budget = next.balance;
    for (ticker, fraction) in order.iter() {
        let Some(f) = effective_fraction(fraction).filter(|f| *f > 0.0) else {
            continue;
        };
        let Some(price) = usable_price(prices, ticker) else {
            continue;
        };
        let spend = (budget * f).min(next.balance);
        if spend <= 0.0 {
            continue;
        }
        next.add(ticker, spend / price);
        next.balance = (next.balance - spend).max(0.0);
    }
    next
}

pub struct TradeAgent {
    profile_id: ProfileId,
    profile_name: String,
    store: Arc<dyn ProfileStore>,
    feed: Arc<dyn PriceFeedPort>,
    broker: Arc<dyn BrokerPort>,
}

impl TradeAgent {
    pub fn new(
        profile_id: ProfileId,
        profile_name: impl Into<String>,
        store: Arc<dyn ProfileStore>,
        feed: Arc<dyn PriceFeedPort>,
        broker: Arc<dyn BrokerPort>,
    ) -> Self {
        Self {
            profile_id,
            profile_name: profile_name.into(),
            store,
            feed,
            broker,
        }
    }

    /// Execute `order` against the ledger selected by `status`.
    pub fn trade(
        &self,
        status: ProfileStatus,
        live: &mut Ledger,
        paper: &mut Ledger,
        order: &Order,
    ) -> Result<(), QuorumError> {
        match status {
            ProfileStatus::Active => self.trade_live(live, order),
            ProfileStatus::PaperTrading => self.trade_paper(paper, order),
            ProfileStatus::Inactive => {
                info!(
                    "{}: inactive, not executing order of {} tickers: {:?}",
                    self.profile_name,
                    order.len(),
                    order
                );
                Ok(())
            }
            ProfileStatus::Backtesting => Err(QuorumError::InvalidTransition {
                profile: self.profile_name.clone(),
                reason: "orders during a backtest are simulated, not traded".into(),
            }),
            ProfileStatus::Error(code) => Err(QuorumError::ProfileErrored {
                profile: self.profile_name.clone(),
                status: code,
            }),
        }
    }

    fn trade_live(&self, ledger: &mut Ledger, order: &Order) -> Result<(), QuorumError> {
        let mut fills = Vec::new();
        let submitted = self.submit_order(ledger, order, &mut fills);
        if fills.is_empty() {
            return submitted;
        }
        for fill in &fills {
            info!(
                "{}: filled {} {:+.6} @ {:.4}",
                self.profile_name, fill.ticker, fill.quantity, fill.price
            );
        }
        if let Err(e) = &submitted {
            warn!(
                "{}: order stopped after {} fills: {}",
                self.profile_name,
                fills.len(),
                e
            );
        }
        let update = ProfileUpdate {
            balance: Some(ledger.balance),
            wallet: Some(ledger.wallet.clone()),
            ..Default::default()
        };
        let persisted = self.persist(&update, "live ledger");
        submitted.and(persisted)
    }

    fn submit_order(&self, ledger: &mut Ledger, order: &Order, fills: &mut Vec<Fill>) -> Result<(), QuorumError> {
        for (ticker, fraction) in order.iter() {
            let Some(f) = effective_fraction(fraction).filter(|f| *f < 0.0) else {
                continue;
            };
            let held = ledger.wallet.get(ticker).copied().unwrap_or(0.0);
            let quantity = held * f.abs();
            if quantity <= 0.0 {
                continue;
            }
            let fill = self.broker.submit(ticker, -quantity)?;
            self.book(ledger, &fill);
            fills.push(fill);
        }

        let budget = ledger.balance;
        for (ticker, fraction) in order.iter() {
            let Some(f) = effective_fraction(fraction).filter(|f| *f > 0.0) else {
                continue;
            };
            let spend = (budget * f).min(ledger.balance);
            if spend <= 0.0 {
                continue;
            }
            let price = self.feed.latest_price(ticker)?;
            if !price.is_finite() || price <= 0.0 {
                return Err(QuorumError::NoPrice {
                    ticker: ticker.to_string(),
                    reason: format!("unusable price {}", price),
                });
            }
            let fill = self.broker.submit(ticker, spend / price)?;
            self.book(ledger, &fill);
            fills.push(fill);
        }
        Ok(())
    }

    fn book(&self, ledger: &mut Ledger, fill: &Fill) {
        let shortfall = ledger.apply_fill(fill);
        if shortfall > SHORTFALL_TOLERANCE {
            warn!(
                "{}: fill {} {:+.6} @ {:.4} cost {:.4} more than the balance held",
                self.profile_name, fill.ticker, fill.quantity, fill.price, shortfall
            );
        }
    }

    fn trade_paper(&self, ledger: &mut Ledger, order: &Order) -> Result<(), QuorumError> {
        let mut prices = PriceMap::new();
        for (ticker, fraction) in order.iter() {
            if effective_fraction(fraction).is_some() {
                prices.insert(ticker.to_string(), self.feed.latest_price(ticker)?);
            }
        }

        let snapshot = ledger.clone();
        *ledger = apply_order(&snapshot, order, &prices);
        let update = ProfileUpdate {
            paper_balance: Some(ledger.balance),
            paper_wallet: Some(ledger.wallet.clone()),
            ..Default::default()
        };
        if let Err(e) = self.persist(&update, "paper ledger") {
            warn!("{}: paper trade rolled back: {}", self.profile_name, e);
            *ledger = snapshot;
            return Err(e);
        }
        info!(
            "{}: paper trade applied, balance {:.2} -> {:.2}",
            self.profile_name, snapshot.balance, ledger.balance
        );
        Ok(())
    }

    fn persist(&self, update: &ProfileUpdate, what: &str) -> Result<(), QuorumError> {
        if self.store.update_profile(self.profile_id, update)? {
            Ok(())
        } else {
            Err(QuorumError::persistence(
                what,
                format!("profile {} was not updated", self.profile_id),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn prices(entries: &[(&str, f64)]) -> PriceMap {
        entries.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    fn order(entries: &[(&str, f64)]) -> Order {
        entries.iter().map(|(t, f)| (t.to_string(), *f)).collect()
    }

    #[test]
    fn buy_spends_fraction_of_balance() {
        let ledger = Ledger::new(1000.0);
        let next = apply_order(&ledger, &order(&[("BTC", 0.5)]), &prices(&[("BTC", 100.0)]));
        assert!((next.balance - 500.0).abs() < 1e-9);
        assert!((next.wallet["BTC"] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn overpriced_fill_reports_its_shortfall() {
        let mut ledger = Ledger::new(100.0);
        let fill = Fill {
            ticker: "BTC".into(),
            quantity: 1.0,
            price: 130.0,
        };
        let shortfall = ledger.apply_fill(&fill);
        assert!((shortfall - 30.0).abs() < 1e-9);
        assert_eq!(ledger.balance, 0.0);
        assert_eq!(ledger.wallet["BTC"], 1.0);

        let covered = Fill {
            ticker: "BTC".into(),
            quantity: -1.0,
            price: 50.0,
        };
        assert_eq!(ledger.apply_fill(&covered), 0.0);
        assert!((ledger.balance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn sells_run_before_buys() {
        let mut wallet = Wallet::new();
        wallet.insert("ETH".into(), 10.0);
        let ledger = Ledger::with_wallet(0.0, wallet);
        let next = apply_order(
            &ledger,
            &order(&[("BTC", 1.0), ("ETH", -1.0)]),
            &prices(&[("BTC", 50.0), ("ETH", 20.0)]),
        );
        // 10 ETH sold for 200, all of it spent on 4 BTC
        assert!(!next.wallet.contains_key("ETH"));
        assert!((next.wallet["BTC"] - 4.0).abs() < 1e-9);
        assert!(next.balance.abs() < 1e-9);
    }

    #[test]
    fn buys_share_the_post_sell_budget() {
        let ledger = Ledger::new(1000.0);
        let next = apply_order(
            &ledger,
            &order(&[("A", 0.6), ("B", 0.6)]),
            &prices(&[("A", 1.0), ("B", 1.0)]),
        );
        assert!((next.wallet["A"] - 600.0).abs() < 1e-9);
        assert!((next.wallet["B"] - 400.0).abs() < 1e-9);
        assert_eq!(next.balance, 0.0);
    }

    #[test]
    fn unpriced_and_degenerate_entries_are_noops() {
        let ledger = Ledger::new(100.0);
        let next = apply_order(
            &ledger,
            &order(&[("A", 0.5), ("B", f64::NAN), ("C", 0.0), ("D", 0.5)]),
            &prices(&[("B", 1.0), ("C", 1.0), ("D", 0.0)]),
        );
        assert_eq!(next, ledger);
    }

    #[test]
    fn liquidation_value_ignores_unpriced_holdings() {
        let mut wallet = Wallet::new();
        wallet.insert("A".into(), 2.0);
        wallet.insert("B".into(), 3.0);
        let ledger = Ledger::with_wallet(10.0, wallet);
        assert!((ledger.liquidation_value(&prices(&[("A", 5.0)])) - 20.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn quantities_and_balance_never_go_negative(
            balance in 0.0f64..10_000.0,
            held in 0.0f64..100.0,
            fractions in prop::collection::vec(-5.0f64..5.0, 1..6),
            price in 0.01f64..1_000.0,
        ) {
            let tickers = ["A", "B", "C", "D", "E", "F"];
            let mut wallet = Wallet::new();
            for t in tickers {
                wallet.insert(t.to_string(), held);
            }
            let ledger = Ledger::with_wallet(balance, wallet);
            let order: Order = fractions
                .iter()
                .zip(tickers)
                .map(|(f, t)| (t.to_string(), *f))
                .collect();
            let prices: PriceMap = tickers.iter().map(|t| (t.to_string(), price)).collect();

            let next = apply_order(&ledger, &order, &prices);
            prop_assert!(next.balance >= 0.0);
            prop_assert!(next.wallet.values().all(|q| *q >= 0.0));
            let before = ledger.liquidation_value(&prices);
            let after = next.liquidation_value(&prices);
            prop_assert!((before - after).abs() <= 1e-6 * before.max(1.0));
        }
    }
}
