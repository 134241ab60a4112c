#![allow(dead_code)]

use chrono::NaiveDate;
use quorum::adapters::memory_store::MemoryStore;
use quorum::domain::binding::{BindingId, PluginJob};
use quorum::domain::component::ScoringComponent;
use quorum::domain::confidence::ConfidenceTable;
use quorum::domain::error::QuorumError;
use quorum::domain::interval::SamplingInterval;
pub use quorum::domain::ohlcv::{OhlcvBar, PriceSeries};
use quorum::domain::plugin::{PluginContext, PluginInstance, TablePlugin};
use quorum::domain::profile::{Profile, ProfileDeps};
use quorum::domain::record::{
    ComponentRecord, PluginRecord, ProfileId, ProfileKey, ProfileRecord, ProfileUpdate,
};
use quorum::domain::registry::Registry;
use quorum::domain::settings::{self, Settings};
use quorum::ports::broker_port::{BrokerPort, Fill};
use quorum::ports::feed_port::PriceFeedPort;
use quorum::ports::store_port::ProfileStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Hourly bars from 2024-01-01 with every price field set to the close.
pub fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start + chrono::Duration::hours(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

pub fn ramp(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// In-memory price feed. Series are keyed by ticker and interval; a ticker
/// registered without an interval serves the same bars at every interval.
#[derive(Default)]
pub struct MockFeed {
    series: Mutex<HashMap<(String, Option<SamplingInterval>), Vec<OhlcvBar>>>,
    prices: Mutex<HashMap<String, f64>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(self, ticker: &str, prices: &[f64]) -> Self {
        self.series
            .lock()
            .unwrap()
            .insert((ticker.to_string(), None), make_bars(prices));
        self
    }

    pub fn with_interval_series(self, ticker: &str, interval: SamplingInterval, bars: Vec<OhlcvBar>) -> Self {
        self.series
            .lock()
            .unwrap()
            .insert((ticker.to_string(), Some(interval)), bars);
        self
    }

    pub fn set_price(&self, ticker: &str, price: f64) {
        self.prices.lock().unwrap().insert(ticker.to_string(), price);
    }

    fn bars(&self, ticker: &str, interval: Option<SamplingInterval>) -> Option<Vec<OhlcvBar>> {
        let series = self.series.lock().unwrap();
        series
            .get(&(ticker.to_string(), interval))
            .or_else(|| series.get(&(ticker.to_string(), None)))
            .cloned()
    }
}

impl PriceFeedPort for MockFeed {
    fn fetch_series(
        &self,
        ticker: &str,
        interval: SamplingInterval,
        candles: usize,
    ) -> Result<PriceSeries, QuorumError> {
        let mut bars = self.bars(ticker, Some(interval)).ok_or_else(|| QuorumError::NoData {
            ticker: ticker.to_string(),
            interval: interval.to_string(),
        })?;
        let skip = bars.len().saturating_sub(candles);
        bars.drain(..skip);
        Ok(PriceSeries::new(ticker, interval, bars))
    }

    fn latest_price(&self, ticker: &str) -> Result<f64, QuorumError> {
        if let Some(price) = self.prices.lock().unwrap().get(ticker) {
            return Ok(*price);
        }
        SamplingInterval::ALL
            .into_iter()
            .find_map(|i| self.bars(ticker, Some(i)))
            .and_then(|bars| bars.last().map(|b| b.close))
            .ok_or_else(|| QuorumError::NoPrice {
                ticker: ticker.to_string(),
                reason: "no mock series".into(),
            })
    }
}

/// Broker filling at the feed's latest price and recording every fill.
pub struct RecordingBroker {
    feed: Arc<MockFeed>,
    pub fills: Mutex<Vec<Fill>>,
    reject: Mutex<Option<String>>,
}

impl RecordingBroker {
    pub fn new(feed: Arc<MockFeed>) -> Self {
        Self {
            feed,
            fills: Mutex::new(Vec::new()),
            reject: Mutex::new(None),
        }
    }

    pub fn reject_ticker(&self, ticker: &str) {
        *self.reject.lock().unwrap() = Some(ticker.to_string());
    }

    pub fn fills(&self) -> Vec<Fill> {
        self.fills.lock().unwrap().clone()
    }
}

impl BrokerPort for RecordingBroker {
    fn submit(&self, ticker: &str, quantity: f64) -> Result<Fill, QuorumError> {
        if self.reject.lock().unwrap().as_deref() == Some(ticker) {
            return Err(QuorumError::Broker {
                ticker: ticker.to_string(),
                reason: "rejected by test broker".into(),
            });
        }
        let fill = Fill {
            ticker: ticker.to_string(),
            quantity,
            price: self.feed.latest_price(ticker)?,
        };
        self.fills.lock().unwrap().push(fill.clone());
        Ok(fill)
    }
}

/// Which component updates fail: all of them, or the given call numbers
/// (1-based, counted from when they were set).
#[derive(Default)]
struct UpdateFaults {
    calls: usize,
    fail_all: bool,
    fail_calls: Vec<usize>,
}

/// Memory store whose profile updates, profile deletes and component
/// updates can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_profile_updates: AtomicBool,
    fail_profile_deletes: AtomicBool,
    component_faults: Mutex<UpdateFaults>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_profile_updates(&self, fail: bool) {
        self.fail_profile_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profile_deletes(&self, fail: bool) {
        self.fail_profile_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_component_updates(&self, fail: bool) {
        self.component_faults.lock().unwrap().fail_all = fail;
    }

    /// Fail only the listed upcoming component updates, e.g. `&[2]` lets
    /// the next update through and refuses the one after it.
    pub fn fail_component_update_calls(&self, calls: &[usize]) {
        let mut faults = self.component_faults.lock().unwrap();
        faults.calls = 0;
        faults.fail_calls = calls.to_vec();
    }

    fn refused(what: &str) -> QuorumError {
        QuorumError::DatabaseQuery {
            reason: format!("disk I/O error while updating {}", what),
        }
    }
}

impl ProfileStore for FlakyStore {
    fn create_profile(&self, record: &ProfileRecord) -> Result<ProfileRecord, QuorumError> {
        self.inner.create_profile(record)
    }

    fn get_profile(&self, key: &ProfileKey) -> Result<Option<ProfileRecord>, QuorumError> {
        self.inner.get_profile(key)
    }

    fn list_profiles(&self) -> Result<Vec<ProfileRecord>, QuorumError> {
        self.inner.list_profiles()
    }

    fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> Result<bool, QuorumError> {
        if self.fail_profile_updates.load(Ordering::SeqCst) {
            return Err(Self::refused("profile"));
        }
        self.inner.update_profile(id, update)
    }

    fn delete_profile(&self, id: ProfileId) -> Result<bool, QuorumError> {
        if self.fail_profile_deletes.load(Ordering::SeqCst) {
            return Err(Self::refused("profile"));
        }
        self.inner.delete_profile(id)
    }

    fn create_component(&self, record: &ComponentRecord) -> Result<ComponentRecord, QuorumError> {
        self.inner.create_component(record)
    }

    fn get_component(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<ComponentRecord>, QuorumError> {
        self.inner.get_component(profile_id, id)
    }

    fn list_components(&self, profile_id: ProfileId) -> Result<Vec<ComponentRecord>, QuorumError> {
        self.inner.list_components(profile_id)
    }

    fn update_component(&self, record: &ComponentRecord) -> Result<bool, QuorumError> {
        {
            let mut faults = self.component_faults.lock().unwrap();
            faults.calls += 1;
            if faults.fail_all || faults.fail_calls.contains(&faults.calls) {
                return Err(Self::refused("component"));
            }
        }
        self.inner.update_component(record)
    }

    fn delete_component(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError> {
        self.inner.delete_component(profile_id, id)
    }

    fn create_plugin(&self, record: &PluginRecord) -> Result<PluginRecord, QuorumError> {
        self.inner.create_plugin(record)
    }

    fn get_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<PluginRecord>, QuorumError> {
        self.inner.get_plugin(profile_id, id)
    }

    fn list_plugins(&self, profile_id: ProfileId) -> Result<Vec<PluginRecord>, QuorumError> {
        self.inner.list_plugins(profile_id)
    }

    fn update_plugin(&self, record: &PluginRecord) -> Result<bool, QuorumError> {
        self.inner.update_plugin(record)
    }

    fn delete_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError> {
        self.inner.delete_plugin(profile_id, id)
    }
}

/// Component scoring a constant, `{"score": x}`.
pub struct FixedScore {
    pub score: f64,
}

impl ScoringComponent for FixedScore {
    fn score(&self, _bars: &[OhlcvBar]) -> Result<f64, QuorumError> {
        Ok(self.score)
    }

    fn lookback(&self) -> usize {
        5
    }
}

/// Component scoring +1 when the last close rose and -1 when it fell.
pub struct LastMove;

impl ScoringComponent for LastMove {
    fn score(&self, bars: &[OhlcvBar]) -> Result<f64, QuorumError> {
        Ok(match bars {
            [.., prev, last] if last.close > prev.close => 1.0,
            [.., prev, last] if last.close < prev.close => -1.0,
            _ => 0.0,
        })
    }

    fn lookback(&self) -> usize {
        2
    }
}

/// AFTER_EVALUATION plugin that replaces the table with an empty one.
pub struct DropTable;

impl TablePlugin for DropTable {
    fn run(&self, _ctx: &mut PluginContext<'_>, _table: ConfidenceTable) -> Result<ConfidenceTable, QuorumError> {
        Ok(ConfidenceTable::new())
    }
}

/// Built-ins plus `fixed`, `last_move` and `drop_table`.
pub fn test_registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register_plugin("drop_table", PluginJob::AfterEvaluation, |_: &Settings| {
        Ok(PluginInstance::AfterEvaluation(Box::new(DropTable)))
    });
    registry.register_component("fixed", |s: &Settings| {
        Ok(Box::new(FixedScore {
            score: settings::get_f64(s, "fixed", "score", 0.0)?,
        }))
    });
    registry.register_component("last_move", |_: &Settings| Ok(Box::new(LastMove)));
    registry
}

pub struct Harness {
    pub feed: Arc<MockFeed>,
    pub broker: Arc<RecordingBroker>,
    pub store: Arc<FlakyStore>,
    pub deps: ProfileDeps,
}

impl Harness {
    pub fn new(feed: MockFeed) -> Self {
        let feed = Arc::new(feed);
        let broker = Arc::new(RecordingBroker::new(feed.clone()));
        let store = Arc::new(FlakyStore::new());
        let deps = ProfileDeps {
            store: store.clone(),
            feed: feed.clone(),
            broker: broker.clone(),
            registry: Arc::new(test_registry()),
        };
        Self {
            feed,
            broker,
            store,
            deps,
        }
    }

    /// Persist a fresh INACTIVE profile and build it.
    pub fn profile(&self, name: &str, balance: f64) -> Arc<Profile> {
        let record = self
            .store
            .create_profile(&ProfileRecord::draft(name, balance))
            .unwrap();
        Profile::from_records(record, Vec::new(), Vec::new(), self.deps.clone()).unwrap()
    }

    pub fn stored(&self, id: ProfileId) -> ProfileRecord {
        self.store.get_profile(&ProfileKey::Id(id)).unwrap().unwrap()
    }
}

pub fn score(x: f64) -> Settings {
    serde_json::json!({ "score": x })
}

pub fn no_settings() -> Settings {
    settings::empty()
}
