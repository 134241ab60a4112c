//! Per-evaluation confidence table and the order it reduces to.
//!
//! Both are rebuilt on every evaluation and never persisted. Ordered maps keep
//! iteration deterministic, which backtest reproducibility depends on.

use std::collections::BTreeMap;

use crate::domain::binding::BindingId;

/// Source of a score inside a [`ConfidenceTable`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalKey {
    Component(BindingId),
    Plugin(BindingId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceTable {
    rows: BTreeMap<String, BTreeMap<SignalKey, f64>>,
}

impl ConfidenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `ticker` has a row, possibly empty ("no signal").
    pub fn ensure_ticker(&mut self, ticker: &str) {
        if !self.rows.contains_key(ticker) {
            self.rows.insert(ticker.to_string(), BTreeMap::new());
        }
    }

    /// Insert or overwrite a score.
    pub fn insert(&mut self, ticker: &str, key: SignalKey, score: f64) {
        self.rows
            .entry(ticker.to_string())
            .or_default()
            .insert(key, score);
    }

    pub fn scores(&self, ticker: &str) -> Option<&BTreeMap<SignalKey, f64>> {
        self.rows.get(ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<SignalKey, f64>)> {
        self.rows.iter().map(|(t, s)| (t.as_str(), s))
    }

    /// Mean score of a ticker, `None` when the row is missing or empty.
    pub fn mean(&self, ticker: &str) -> Option<f64> {
        let row = self.rows.get(ticker)?;
        if row.is_empty() {
            return None;
        }
        Some(row.values().sum::<f64>() / row.len() as f64)
    }

    /// True when every row and every key of `earlier` is still present.
    pub fn retains(&self, earlier: &ConfidenceTable) -> bool {
        earlier.rows.iter().all(|(ticker, keys)| match self.rows.get(ticker) {
            Some(row) => keys.keys().all(|k| row.contains_key(k)),
            None => false,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Signed fractional allocation change per ticker, each in [-1, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    allocations: BTreeMap<String, f64>,
}

impl Order {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, ticker: &str, fraction: f64) {
        self.allocations.insert(ticker.to_string(), fraction);
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.allocations.get(ticker).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.allocations.iter().map(|(t, f)| (t.as_str(), *f))
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

impl FromIterator<(String, f64)> for Order {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            allocations: iter.into_iter().collect(),
        }
    }
}
