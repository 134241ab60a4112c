//! Factory map from component and plugin names to constructors.
//!
//! Built once at process start and handed to every profile as
//! `Arc<Registry>`.

use std::collections::HashMap;

use crate::domain::binding::PluginJob;
use crate::domain::component::{ema, roc, rsi, ScoringComponent};
use crate::domain::error::QuorumError;
use crate::domain::plugin::{mean_threshold, performance_weight, signal_overlay, PluginInstance};
use crate::domain::settings::Settings;

type ComponentFactory = Box<dyn Fn(&Settings) -> Result<Box<dyn ScoringComponent>, QuorumError> + Send + Sync>;
type PluginFactory = Box<dyn Fn(&Settings) -> Result<PluginInstance, QuorumError> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    components: HashMap<String, ComponentFactory>,
    plugins: HashMap<String, (PluginJob, PluginFactory)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in component and plugin.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_component(ema::NAME, |s| Ok(Box::new(ema::EmaTrend::from_settings(s)?)));
        registry.register_component(rsi::NAME, |s| Ok(Box::new(rsi::RsiReversion::from_settings(s)?)));
        registry.register_component(roc::NAME, |s| Ok(Box::new(roc::Momentum::from_settings(s)?)));

        registry.register_plugin(mean_threshold::NAME, PluginJob::CreateOrder, |_| {
            Ok(PluginInstance::CreateOrder(Box::new(mean_threshold::MeanThreshold)))
        });
        registry.register_plugin(performance_weight::NAME, PluginJob::BeforeEvaluation, |s| {
            Ok(PluginInstance::BeforeEvaluation(Box::new(
                performance_weight::PerformanceWeight::from_settings(s)?,
            )))
        });
        registry.register_plugin(signal_overlay::NAME, PluginJob::AfterEvaluation, |s| {
            Ok(PluginInstance::AfterEvaluation(Box::new(
                signal_overlay::SignalOverlay::from_settings(s)?,
            )))
        });
        registry
    }

    pub fn register_component<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Settings) -> Result<Box<dyn ScoringComponent>, QuorumError> + Send + Sync + 'static,
    {
        self.components.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_plugin<F>(&mut self, name: &str, job: PluginJob, factory: F)
    where
        F: Fn(&Settings) -> Result<PluginInstance, QuorumError> + Send + Sync + 'static,
    {
        self.plugins.insert(name.to_string(), (job, Box::new(factory)));
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn build_component(&self, name: &str, settings: &Settings) -> Result<Box<dyn ScoringComponent>, QuorumError> {
        let factory = self
            .components
            .get(name)
            .ok_or_else(|| QuorumError::UnknownComponent { name: name.to_string() })?;
        factory(settings)
    }

    /// Job a plugin was registered for, known without building it.
    pub fn plugin_job(&self, name: &str) -> Result<PluginJob, QuorumError> {
        self.plugins
            .get(name)
            .map(|(job, _)| *job)
            .ok_or_else(|| QuorumError::UnknownPlugin { name: name.to_string() })
    }

    pub fn build_plugin(&self, name: &str, settings: &Settings) -> Result<PluginInstance, QuorumError> {
        let (_, factory) = self
            .plugins
            .get(name)
            .ok_or_else(|| QuorumError::UnknownPlugin { name: name.to_string() })?;
        factory(settings)
    }

    pub fn component_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings;
    use serde_json::json;

    #[test]
    fn builtins_are_registered() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.component_names(), vec!["ema", "roc", "rsi"]);
        assert_eq!(
            registry.plugin_names(),
            vec!["mean_threshold", "performance_weight", "signal_overlay"]
        );
    }

    #[test]
    fn plugin_jobs_known_without_building() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.plugin_job("mean_threshold").unwrap(), PluginJob::CreateOrder);
        assert_eq!(
            registry.plugin_job("performance_weight").unwrap(),
            PluginJob::BeforeEvaluation
        );
        assert_eq!(registry.plugin_job("signal_overlay").unwrap(), PluginJob::AfterEvaluation);
        assert!(matches!(
            registry.plugin_job("oracle"),
            Err(QuorumError::UnknownPlugin { .. })
        ));
    }

    #[test]
    fn built_plugin_matches_registered_job() {
        let registry = Registry::with_builtins();
        for name in registry.plugin_names() {
            let instance = registry.build_plugin(name, &settings::empty()).unwrap();
            assert_eq!(instance.job(), registry.plugin_job(name).unwrap());
        }
    }

    #[test]
    fn build_component_passes_settings() {
        let registry = Registry::with_builtins();
        let c = registry.build_component("roc", &json!({"period": 4})).unwrap();
        assert_eq!(c.lookback(), 5);
        assert!(registry.build_component("roc", &json!({"period": 0})).is_err());
        assert!(!registry.has_component("macd"));
    }
}
