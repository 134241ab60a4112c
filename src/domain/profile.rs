//! Trading profile: state, lifecycle and the evaluation pipeline.
//!
//! All mutable state sits behind one mutex. Every public operation that
//! mutates takes the lock for its whole duration; the backtest keeps it for
//! the full replay and drives the same pipeline through the held guard.
//!
//! Evaluation order: BEFORE_EVALUATION plugins, scoring, AFTER_EVALUATION
//! plugins, the CREATE_ORDER plugin, then the trade agent.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use log::{error, info, warn};

use crate::domain::backtest::{self, BacktestReport, BacktestRequest};
use crate::domain::binding::{BindingId, ComponentBinding, PluginBinding, PluginJob};
use crate::domain::confidence::{ConfidenceTable, Order};
use crate::domain::error::QuorumError;
use crate::domain::interval::SamplingInterval;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::plugin::{PluginContext, PluginInstance, SliceMap};
use crate::domain::record::{
    ComponentRecord, PluginRecord, ProfileId, ProfileRecord, ProfileUpdate, Wallet,
};
use crate::domain::registry::Registry;
use crate::domain::scheduler::Scheduler;
use crate::domain::scoring;
use crate::domain::settings::Settings;
use crate::domain::status::ProfileStatus;
use crate::domain::trade_agent::{Ledger, TradeAgent};
use crate::ports::broker_port::BrokerPort;
use crate::ports::feed_port::PriceFeedPort;
use crate::ports::store_port::ProfileStore;

/// Collaborators shared by every profile of a process.
#[derive(Clone)]
pub struct ProfileDeps {
    pub store: Arc<dyn ProfileStore>,
    pub feed: Arc<dyn PriceFeedPort>,
    pub broker: Arc<dyn BrokerPort>,
    pub registry: Arc<Registry>,
}

#[derive(Debug)]
pub struct ProfileState {
    pub status: ProfileStatus,
    pub live: Ledger,
    pub paper: Ledger,
    pub buy_limit: f64,
    pub sell_limit: f64,
    pub components: Vec<ComponentBinding>,
    pub plugins: Vec<PluginBinding>,
}

impl ProfileState {
    fn order_plugin(&self) -> Option<&PluginBinding> {
        self.plugins.iter().find(|p| p.job() == PluginJob::CreateOrder)
    }

    /// Tickers held in the ledger the current status trades with.
    fn held_tickers(&self) -> Vec<String> {
        let wallet = match self.status {
            ProfileStatus::PaperTrading => &self.paper.wallet,
            _ => &self.live.wallet,
        };
        wallet.keys().cloned().collect()
    }
}

/// Read-only copy of a profile's state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    pub id: ProfileId,
    pub name: String,
    pub status: ProfileStatus,
    pub live: Ledger,
    pub paper: Ledger,
    pub buy_limit: f64,
    pub sell_limit: f64,
    pub components: Vec<ComponentRecord>,
    pub plugins: Vec<PluginRecord>,
}

pub fn validate_limits(buy_limit: f64, sell_limit: f64) -> Result<(), QuorumError> {
    if !(buy_limit > 0.0 && buy_limit <= 1.0) {
        return Err(QuorumError::ConfigInvalid {
            section: "profile".into(),
            key: "buy_limit".into(),
            reason: format!("buy_limit must be in (0, 1], got {}", buy_limit),
        });
    }
    if !(-1.0..0.0).contains(&sell_limit) {
        return Err(QuorumError::ConfigInvalid {
            section: "profile".into(),
            key: "sell_limit".into(),
            reason: format!("sell_limit must be in [-1, 0), got {}", sell_limit),
        });
    }
    Ok(())
}

pub struct Profile {
    id: ProfileId,
    name: String,
    state: Mutex<ProfileState>,
    scheduler: Scheduler,
    agent: TradeAgent,
    deps: ProfileDeps,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl Profile {
    /// Build a profile from persisted records. The scheduler starts paused
    /// whatever the persisted status is.
    pub fn from_records(
        record: ProfileRecord,
        components: Vec<ComponentRecord>,
        plugins: Vec<PluginRecord>,
        deps: ProfileDeps,
    ) -> Result<Arc<Self>, QuorumError> {
        let order_plugins: Vec<&PluginRecord> =
            plugins.iter().filter(|p| p.job == PluginJob::CreateOrder).collect();
        if let [first, _, ..] = order_plugins.as_slice() {
            return Err(QuorumError::DuplicateOrderPlugin {
                profile: record.name.clone(),
                existing: first.id,
            });
        }

        let slot: Arc<OnceLock<Weak<Profile>>> = Arc::new(OnceLock::new());
        let job_slot = slot.clone();
        let period = Duration::from_secs(record.schedule_seconds.max(1));
        let scheduler = Scheduler::spawn(&record.name, period, move || {
            match job_slot.get().and_then(Weak::upgrade) {
                Some(profile) => profile.evaluate().map(|_| ()),
                None => Ok(()),
            }
        })?;

        let agent = TradeAgent::new(
            record.id,
            record.name.clone(),
            deps.store.clone(),
            deps.feed.clone(),
            deps.broker.clone(),
        );
        let state = ProfileState {
            status: record.status,
            live: Ledger::with_wallet(record.balance, record.wallet),
            paper: Ledger::with_wallet(record.paper_balance, record.paper_wallet),
            buy_limit: record.buy_limit,
            sell_limit: record.sell_limit,
            components: components.into_iter().map(ComponentBinding::new).collect(),
            plugins: plugins.into_iter().map(PluginBinding::new).collect(),
        };
        let profile = Arc::new(Self {
            id: record.id,
            name: record.name,
            state: Mutex::new(state),
            scheduler,
            agent,
            deps,
        });
        let _ = slot.set(Arc::downgrade(&profile));
        Ok(profile)
    }

    pub fn id(&self) -> ProfileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ProfileStatus {
        self.lock().status
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        let state = self.lock();
        ProfileSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: state.status,
            live: state.live.clone(),
            paper: state.paper.clone(),
            buy_limit: state.buy_limit,
            sell_limit: state.sell_limit,
            components: state.components.iter().map(|c| c.record.clone()).collect(),
            plugins: state.plugins.iter().map(|p| p.record.clone()).collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProfileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- bindings ------------------------------------------------------

    pub fn add_component(
        &self,
        name: &str,
        weight: f64,
        ticker: &str,
        interval: SamplingInterval,
        settings: Settings,
    ) -> Result<BindingId, QuorumError> {
        if !weight.is_finite() {
            return Err(QuorumError::InvalidSettings {
                name: name.to_string(),
                reason: "weight must be finite".into(),
            });
        }
        self.deps.registry.build_component(name, &settings)?;

        let mut state = self.lock();
        let record = self.deps.store.create_component(&ComponentRecord {
            id: 0,
            profile_id: self.id,
            name: name.to_string(),
            weight,
            ticker: ticker.to_string(),
            interval,
            settings,
        })?;
        let id = record.id;
        info!("{}: bound component {} '{}' on {} {}", self.name, id, name, ticker, interval);
        state.components.push(ComponentBinding::new(record));
        Ok(id)
    }

    /// Change a component's weight and/or settings.
    pub fn update_component(
        &self,
        id: BindingId,
        weight: Option<f64>,
        settings: Option<Settings>,
    ) -> Result<(), QuorumError> {
        let mut state = self.lock();
        let binding = state
            .components
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| self.binding_not_found(id))?;

        let mut record = binding.record.clone();
        if let Some(w) = weight {
            if !w.is_finite() {
                return Err(QuorumError::InvalidSettings {
                    name: record.name.clone(),
                    reason: "weight must be finite".into(),
                });
            }
            record.weight = w;
        }
        if let Some(s) = &settings {
            self.deps.registry.build_component(&record.name, s)?;
            record.settings = s.clone();
        }
        self.persist_component(&record)?;

        binding.record.weight = record.weight;
        if let Some(s) = settings {
            binding.set_settings(s);
        }
        Ok(())
    }

    pub fn remove_component(&self, id: BindingId) -> Result<(), QuorumError> {
        let mut state = self.lock();
        let pos = state
            .components
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| self.binding_not_found(id))?;
        if !self.deps.store.delete_component(self.id, id)? {
            return Err(QuorumError::persistence(
                format!("removal of component {}", id),
                "no row deleted",
            ));
        }
        state.components.remove(pos);
        info!("{}: removed component {}", self.name, id);
        Ok(())
    }

    /// Bind a plugin. Its job comes from the registry; a second
    /// CREATE_ORDER plugin is refused.
    pub fn add_plugin(&self, name: &str, settings: Settings) -> Result<BindingId, QuorumError> {
        let job = self.deps.registry.plugin_job(name)?;
        let instance = self.deps.registry.build_plugin(name, &settings)?;
        if instance.job() != job {
            return Err(QuorumError::Plugin {
                plugin: name.to_string(),
                reason: format!("registered as {} but implements {}", job, instance.job()),
            });
        }

        let mut state = self.lock();
        if job == PluginJob::CreateOrder {
            if let Some(existing) = state.order_plugin() {
                return Err(QuorumError::DuplicateOrderPlugin {
                    profile: self.name.clone(),
                    existing: existing.id(),
                });
            }
        }
        let record = self.deps.store.create_plugin(&PluginRecord {
            id: 0,
            profile_id: self.id,
            name: name.to_string(),
            job,
            settings,
        })?;
        let id = record.id;
        info!("{}: bound plugin {} '{}' as {}", self.name, id, name, job);
        state.plugins.push(PluginBinding::new(record));
        Ok(id)
    }

    pub fn update_plugin(&self, id: BindingId, settings: Settings) -> Result<(), QuorumError> {
        let mut state = self.lock();
        let binding = state
            .plugins
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| self.binding_not_found(id))?;
        self.deps.registry.build_plugin(&binding.record.name, &settings)?;

        let mut record = binding.record.clone();
        record.settings = settings.clone();
        if !self.deps.store.update_plugin(&record)? {
            return Err(QuorumError::persistence(format!("plugin {}", id), "no row updated"));
        }
        binding.set_settings(settings);
        Ok(())
    }

    pub fn remove_plugin(&self, id: BindingId) -> Result<(), QuorumError> {
        let mut state = self.lock();
        let pos = state
            .plugins
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| self.binding_not_found(id))?;
        if !self.deps.store.delete_plugin(self.id, id)? {
            return Err(QuorumError::persistence(
                format!("removal of plugin {}", id),
                "no row deleted",
            ));
        }
        state.plugins.remove(pos);
        info!("{}: removed plugin {}", self.name, id);
        Ok(())
    }

    pub fn set_limits(&self, buy_limit: f64, sell_limit: f64) -> Result<(), QuorumError> {
        validate_limits(buy_limit, sell_limit)?;
        let mut state = self.lock();
        let update = ProfileUpdate {
            buy_limit: Some(buy_limit),
            sell_limit: Some(sell_limit),
            ..Default::default()
        };
        self.persist_profile(&update, "limits")?;
        state.buy_limit = buy_limit;
        state.sell_limit = sell_limit;
        Ok(())
    }

    fn binding_not_found(&self, id: BindingId) -> QuorumError {
        QuorumError::BindingNotFound {
            profile: self.name.clone(),
            id,
        }
    }

    // ---- lifecycle -----------------------------------------------------

    /// Move to `new_status`.
    ///
    /// INACTIVE and error statuses pause the scheduler. Anything else is
    /// refused from an error status; with `run_immediately` one evaluation
    /// runs under the new status before the scheduler resumes. The status
    /// is persisted after the lock is released; if that fails while the
    /// scheduler runs, the profile is deactivated.
    pub fn change_status(&self, new_status: ProfileStatus, run_immediately: bool) -> Result<(), QuorumError> {
        if new_status == ProfileStatus::Backtesting {
            return Err(QuorumError::InvalidTransition {
                profile: self.name.clone(),
                reason: "BACKTESTING is entered only by running a backtest".into(),
            });
        }

        {
            let mut state = self.lock();
            if new_status.halts_scheduler() {
                self.scheduler.pause();
                state.status = new_status;
            } else {
                self.ensure_runnable(&mut state)?;
                if run_immediately {
                    let previous = state.status;
                    state.status = new_status;
                    if let Err(e) = self.evaluate_locked(&mut state) {
                        state.status = previous;
                        return Err(e);
                    }
                }
                self.scheduler.resume();
                state.status = new_status;
            }
        }
        info!("{}: status -> {}", self.name, new_status);

        if let Err(e) = self.persist_profile(&ProfileUpdate::status(new_status), "status") {
            error!("{}: could not persist status {}: {}", self.name, new_status, e);
            if self.scheduler.is_running() {
                if let Err(inner) = self.change_status(ProfileStatus::Inactive, false) {
                    error!("{}: deactivation after failed persist also failed: {}", self.name, inner);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Run the pipeline once and trade the resulting order.
    pub fn evaluate(&self) -> Result<Order, QuorumError> {
        let mut state = self.lock();
        self.evaluate_locked(&mut state)
    }

    fn evaluate_locked(&self, state: &mut ProfileState) -> Result<Order, QuorumError> {
        self.ensure_runnable(state)?;

        let mut series: Vec<(BindingId, PriceSeries)> = Vec::with_capacity(state.components.len());
        for binding in state.components.iter_mut() {
            let lookback = binding.scorer(&self.deps.registry)?.lookback();
            let s = self
                .deps
                .feed
                .fetch_series(&binding.record.ticker, binding.record.interval, lookback)?;
            series.push((binding.id(), s));
        }
        let slices: SliceMap<'_> = series.iter().map(|(id, s)| (*id, s.bars.as_slice())).collect();

        let held = state.held_tickers();
        let order = self.run_stages(state, &held, &slices, true)?;

        let ProfileState {
            status, live, paper, ..
        } = state;
        self.agent.trade(*status, live, paper, &order)?;
        Ok(order)
    }

    /// Replay history through the pipeline under BACKTESTING.
    ///
    /// The lock is held for the whole run. Status and component weights and
    /// settings are restored on every exit path, panics included.
    pub fn backtest(&self, request: &BacktestRequest) -> Result<BacktestReport, QuorumError> {
        let mut guard = self.lock();
        self.ensure_runnable(&mut guard)?;
        let mut state = BacktestScope::enter(guard);

        let finest = state
            .components
            .iter()
            .map(|c| c.record.interval)
            .min()
            .ok_or_else(|| QuorumError::NoData {
                ticker: "*".into(),
                interval: "*".into(),
            })?;
        let mut series = Vec::with_capacity(state.components.len());
        for binding in state.components.iter() {
            let candles = request.horizon.candles_at(binding.record.interval, finest);
            let s = self
                .deps
                .feed
                .fetch_series(&binding.record.ticker, binding.record.interval, candles)?;
            series.push((binding.id(), s));
        }

        info!("{}: backtest started ({:?})", self.name, request.horizon);
        let report = backtest::replay(request, &series, |slices, ledger| {
            let held: Vec<String> = ledger.wallet.keys().cloned().collect();
            self.run_stages(&mut state, &held, slices, false)
        })?;
        info!(
            "{}: backtest finished, total return {:.4}",
            self.name,
            report.history.total_return()
        );
        Ok(report)
    }

    /// Refuse error-band statuses and profiles without an order plugin,
    /// deactivating the profile in both cases.
    fn ensure_runnable(&self, state: &mut ProfileState) -> Result<(), QuorumError> {
        if let ProfileStatus::Error(code) = state.status {
            return Err(self.deactivate(
                state,
                QuorumError::ProfileErrored {
                    profile: self.name.clone(),
                    status: code,
                },
            ));
        }
        if state.order_plugin().is_none() {
            return Err(self.deactivate(
                state,
                QuorumError::MissingOrderPlugin {
                    profile: self.name.clone(),
                },
            ));
        }
        Ok(())
    }

    fn deactivate(&self, state: &mut ProfileState, cause: QuorumError) -> QuorumError {
        warn!("{}: deactivating: {}", self.name, cause);
        self.scheduler.pause();
        state.status = ProfileStatus::Inactive;
        if let Err(e) = self.persist_profile(&ProfileUpdate::status(ProfileStatus::Inactive), "status") {
            warn!("{}: could not persist deactivation: {}", self.name, e);
        }
        cause
    }

    /// BEFORE plugins, scoring, AFTER plugins and the order plugin.
    /// With `persist`, binding changes made by BEFORE plugins are written
    /// back, and rolled back in memory if that fails.
    fn run_stages(
        &self,
        state: &mut ProfileState,
        held: &[String],
        slices: &SliceMap<'_>,
        persist: bool,
    ) -> Result<Order, QuorumError> {
        let registry = self.deps.registry.as_ref();
        let ProfileState {
            buy_limit,
            sell_limit,
            components,
            plugins,
            ..
        } = state;
        for binding in components.iter_mut() {
            binding.instantiate(registry)?;
        }

        let before: Vec<ComponentRecord> = components.iter().map(|c| c.record.clone()).collect();
        let mut table = ConfidenceTable::new();
        for plugin in plugins.iter_mut().filter(|p| p.job() == PluginJob::BeforeEvaluation) {
            let binding_id = plugin.id();
            let PluginInstance::BeforeEvaluation(p) = plugin.plugin(registry)? else {
                continue;
            };
            let mut ctx = PluginContext {
                profile: &self.name,
                binding_id,
                buy_limit: *buy_limit,
                sell_limit: *sell_limit,
                components: components.as_mut_slice(),
                slices,
            };
            table = p.run(&mut ctx, table)?;
        }
        if persist {
            self.persist_binding_changes(components, &before)?;
        }

        let mut table = scoring::score_components(
            table,
            components,
            registry,
            slices,
            held.iter().map(String::as_str),
        )?;

        for plugin in plugins.iter_mut().filter(|p| p.job() == PluginJob::AfterEvaluation) {
            let binding_id = plugin.id();
            let name = plugin.record.name.clone();
            let PluginInstance::AfterEvaluation(p) = plugin.plugin(registry)? else {
                continue;
            };
            let earlier = table.clone();
            let mut ctx = PluginContext {
                profile: &self.name,
                binding_id,
                buy_limit: *buy_limit,
                sell_limit: *sell_limit,
                components: components.as_mut_slice(),
                slices,
            };
            table = p.run(&mut ctx, table)?;
            if !table.retains(&earlier) {
                return Err(QuorumError::Plugin {
                    plugin: name,
                    reason: "removed entries from the confidence table".into(),
                });
            }
        }

        let order_binding = plugins
            .iter_mut()
            .find(|p| p.job() == PluginJob::CreateOrder)
            .ok_or_else(|| QuorumError::MissingOrderPlugin {
                profile: self.name.clone(),
            })?;
        let binding_id = order_binding.id();
        let name = order_binding.record.name.clone();
        let PluginInstance::CreateOrder(p) = order_binding.plugin(registry)? else {
            return Err(QuorumError::Plugin {
                plugin: name,
                reason: "bound as CREATE_ORDER but cannot create orders".into(),
            });
        };
        let ctx = PluginContext {
            profile: &self.name,
            binding_id,
            buy_limit: *buy_limit,
            sell_limit: *sell_limit,
            components: components.as_mut_slice(),
            slices,
        };
        p.create_order(&ctx, table)
    }

    fn persist_binding_changes(
        &self,
        components: &mut [ComponentBinding],
        before: &[ComponentRecord],
    ) -> Result<(), QuorumError> {
        let mut written = Vec::new();
        let mut failure = None;
        for (i, (binding, old)) in components.iter().zip(before).enumerate() {
            if binding.record == *old {
                continue;
            }
            if let Err(e) = self.persist_component(&binding.record) {
                failure = Some(e);
                break;
            }
            written.push(i);
        }
        let Some(e) = failure else {
            return Ok(());
        };

        warn!("{}: rolling back component changes: {}", self.name, e);
        for (binding, old) in components.iter_mut().zip(before) {
            if binding.record.settings != old.settings {
                binding.set_settings(old.settings.clone());
            }
            binding.record.weight = old.weight;
        }

        // Rows written before the failure get their old values back.
        let mut stale = Vec::new();
        for old in written.into_iter().map(|i| &before[i]) {
            if let Err(rollback) = self.persist_component(old) {
                error!(
                    "{}: component {} keeps its new stored values, rollback failed: {}",
                    self.name, old.id, rollback
                );
                stale.push(format!("{} ({})", old.id, rollback));
            }
        }
        if stale.is_empty() {
            return Err(e);
        }
        Err(QuorumError::persistence(
            format!("component changes of profile {}", self.name),
            format!("{}; rollback failed for component {}", e, stale.join(", ")),
        ))
    }

    fn persist_component(&self, record: &ComponentRecord) -> Result<(), QuorumError> {
        if self.deps.store.update_component(record)? {
            Ok(())
        } else {
            Err(QuorumError::persistence(
                format!("component {}", record.id),
                "no row updated",
            ))
        }
    }

    fn persist_profile(&self, update: &ProfileUpdate, what: &str) -> Result<(), QuorumError> {
        if self.deps.store.update_profile(self.id, update)? {
            Ok(())
        } else {
            Err(QuorumError::persistence(
                format!("{} of profile {}", what, self.name),
                "no row updated",
            ))
        }
    }

    // ---- scheduler control used by the manager --------------------------

    pub(crate) fn stop_scheduler(&self) {
        self.scheduler.stop();
    }

    pub(crate) fn scheduler_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    pub(crate) fn reap_scheduler(&self) {
        self.scheduler.reap();
    }
}

/// Holds the profile lock for a backtest and puts status and component
/// weights and settings back when dropped.
struct BacktestScope<'a> {
    guard: MutexGuard<'a, ProfileState>,
    prior_status: ProfileStatus,
    saved: Vec<(BindingId, f64, Settings)>,
}

impl<'a> BacktestScope<'a> {
    fn enter(mut guard: MutexGuard<'a, ProfileState>) -> Self {
        let prior_status = guard.status;
        let saved = guard
            .components
            .iter()
            .map(|c| (c.id(), c.record.weight, c.record.settings.clone()))
            .collect();
        guard.status = ProfileStatus::Backtesting;
        Self {
            guard,
            prior_status,
            saved,
        }
    }
}

impl Deref for BacktestScope<'_> {
    type Target = ProfileState;

    fn deref(&self) -> &ProfileState {
        &self.guard
    }
}

impl DerefMut for BacktestScope<'_> {
    fn deref_mut(&mut self) -> &mut ProfileState {
        &mut self.guard
    }
}

impl Drop for BacktestScope<'_> {
    fn drop(&mut self) {
        self.guard.status = self.prior_status;
        for (id, weight, settings) in self.saved.drain(..) {
            if let Some(binding) = self.guard.components.iter_mut().find(|c| c.id() == id) {
                binding.record.weight = weight;
                if binding.record.settings != settings {
                    binding.set_settings(settings);
                }
            }
        }
    }
}

/// Wallet summary used in logs and CLI output.
pub fn describe_wallet(wallet: &Wallet) -> String {
    if wallet.is_empty() {
        return "(empty)".to_string();
    }
    wallet
        .iter()
        .map(|(ticker, qty)| format!("{}={:.6}", ticker, qty))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::MemoryStore;
    use crate::domain::component::test_support::make_bars;
    use crate::ports::broker_port::Fill;
    use serde_json::json;

    struct FlatFeed;

    impl PriceFeedPort for FlatFeed {
        fn fetch_series(
            &self,
            ticker: &str,
            interval: SamplingInterval,
            candles: usize,
        ) -> Result<PriceSeries, QuorumError> {
            Ok(PriceSeries::new(ticker, interval, make_bars(&vec![10.0; candles])))
        }

        fn latest_price(&self, _ticker: &str) -> Result<f64, QuorumError> {
            Ok(10.0)
        }
    }

    struct NoBroker;

    impl BrokerPort for NoBroker {
        fn submit(&self, ticker: &str, _quantity: f64) -> Result<Fill, QuorumError> {
            Err(QuorumError::Broker {
                ticker: ticker.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn profile() -> Arc<Profile> {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_profile(&ProfileRecord::draft("unit", 100.0)).unwrap();
        let deps = ProfileDeps {
            store,
            feed: Arc::new(FlatFeed),
            broker: Arc::new(NoBroker),
            registry: Arc::new(Registry::with_builtins()),
        };
        Profile::from_records(record, vec![], vec![], deps).unwrap()
    }

    #[test]
    fn limits_are_validated() {
        assert!(validate_limits(0.5, -0.5).is_ok());
        assert!(validate_limits(1.0, -1.0).is_ok());
        assert!(validate_limits(0.0, -0.5).is_err());
        assert!(validate_limits(1.5, -0.5).is_err());
        assert!(validate_limits(0.5, 0.0).is_err());
        assert!(validate_limits(0.5, -1.5).is_err());
        assert!(validate_limits(f64::NAN, -0.5).is_err());
    }

    #[test]
    fn second_order_plugin_is_refused() {
        let p = profile();
        let first = p.add_plugin("mean_threshold", json!({})).unwrap();
        match p.add_plugin("mean_threshold", json!({})) {
            Err(QuorumError::DuplicateOrderPlugin { existing, .. }) => assert_eq!(existing, first),
            other => panic!("expected DuplicateOrderPlugin, got {other:?}"),
        }
        assert_eq!(p.snapshot().plugins.len(), 1);
    }

    #[test]
    fn backtesting_cannot_be_requested() {
        let p = profile();
        assert!(matches!(
            p.change_status(ProfileStatus::Backtesting, false),
            Err(QuorumError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn unknown_names_are_refused_before_persisting() {
        let p = profile();
        assert!(matches!(
            p.add_component("astrology", 1.0, "BTC", SamplingInterval::Hour1, json!({})),
            Err(QuorumError::UnknownComponent { .. })
        ));
        assert!(matches!(
            p.add_plugin("oracle", json!({})),
            Err(QuorumError::UnknownPlugin { .. })
        ));
        let snap = p.snapshot();
        assert!(snap.components.is_empty() && snap.plugins.is_empty());
    }

    #[test]
    fn backtest_restores_status_and_weights() {
        let p = profile();
        let id = p
            .add_component("roc", 2.0, "BTC", SamplingInterval::Hour1, json!({"period": 2}))
            .unwrap();
        p.add_plugin("performance_weight", json!({"window": 5})).unwrap();
        p.add_plugin("mean_threshold", json!({})).unwrap();

        let request = BacktestRequest {
            starting_balance: 100.0,
            partitions: 1,
            horizon: backtest::Horizon::Candles(6),
        };
        let report = p.backtest(&request).unwrap();
        assert_eq!(report.history.entries(), &[1.0]);

        let snap = p.snapshot();
        assert_eq!(snap.status, ProfileStatus::Inactive);
        let binding = snap.components.iter().find(|c| c.id == id).unwrap();
        assert_eq!(binding.weight, 2.0);
    }

    #[test]
    fn describe_wallet_formats_entries() {
        let mut wallet = Wallet::new();
        assert_eq!(describe_wallet(&wallet), "(empty)");
        wallet.insert("BTC".into(), 0.5);
        assert_eq!(describe_wallet(&wallet), "BTC=0.500000");
    }
}
