//! Component and plugin bindings owned by a profile.
//!
//! A binding pairs a persisted record with a lazily constructed instance. The
//! instance is built from the [`Registry`] the first time it is needed and
//! dropped whenever the settings change.

use std::fmt;
use std::str::FromStr;

use crate::domain::component::ScoringComponent;
use crate::domain::error::QuorumError;
use crate::domain::plugin::PluginInstance;
use crate::domain::record::{ComponentRecord, PluginRecord};
use crate::domain::registry::Registry;
use crate::domain::settings::Settings;

pub type BindingId = i64;

/// Pipeline stage a plugin participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginJob {
    BeforeEvaluation,
    AfterEvaluation,
    CreateOrder,
}

impl PluginJob {
    pub fn label(self) -> &'static str {
        match self {
            PluginJob::BeforeEvaluation => "BEFORE_EVALUATION",
            PluginJob::AfterEvaluation => "AFTER_EVALUATION",
            PluginJob::CreateOrder => "CREATE_ORDER",
        }
    }
}

impl fmt::Display for PluginJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PluginJob {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BEFORE_EVALUATION" => Ok(PluginJob::BeforeEvaluation),
            "AFTER_EVALUATION" => Ok(PluginJob::AfterEvaluation),
            "CREATE_ORDER" => Ok(PluginJob::CreateOrder),
            _ => Err(QuorumError::ConfigInvalid {
                section: "plugin".into(),
                key: "job".into(),
                reason: format!("unknown plugin job '{}'", s),
            }),
        }
    }
}

pub struct ComponentBinding {
    pub record: ComponentRecord,
    instance: Option<Box<dyn ScoringComponent>>,
}

impl ComponentBinding {
    pub fn new(record: ComponentRecord) -> Self {
        Self {
            record,
            instance: None,
        }
    }

    pub fn id(&self) -> BindingId {
        self.record.id
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.record.settings = settings;
        self.instance = None;
    }

    /// Build the scoring component if it has not been built yet.
    pub fn instantiate(&mut self, registry: &Registry) -> Result<(), QuorumError> {
        if self.instance.is_none() {
            self.instance = Some(registry.build_component(&self.record.name, &self.record.settings)?);
        }
        Ok(())
    }

    /// The instance, if [`instantiate`](Self::instantiate) has run.
    pub fn instance(&self) -> Option<&dyn ScoringComponent> {
        self.instance.as_deref()
    }

    pub fn scorer(&mut self, registry: &Registry) -> Result<&dyn ScoringComponent, QuorumError> {
        self.instantiate(registry)?;
        self.instance
            .as_deref()
            .ok_or_else(|| QuorumError::UnknownComponent {
                name: self.record.name.clone(),
            })
    }
}

impl fmt::Debug for ComponentBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBinding")
            .field("record", &self.record)
            .field("instantiated", &self.instance.is_some())
            .finish()
    }
}

pub struct PluginBinding {
    pub record: PluginRecord,
    instance: Option<PluginInstance>,
}

impl PluginBinding {
    pub fn new(record: PluginRecord) -> Self {
        Self {
            record,
            instance: None,
        }
    }

    pub fn id(&self) -> BindingId {
        self.record.id
    }

    pub fn job(&self) -> PluginJob {
        self.record.job
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.record.settings = settings;
        self.instance = None;
    }

    pub fn plugin(&mut self, registry: &Registry) -> Result<&PluginInstance, QuorumError> {
        if self.instance.is_none() {
            let instance = registry.build_plugin(&self.record.name, &self.record.settings)?;
            if instance.job() != self.record.job {
                return Err(QuorumError::Plugin {
                    plugin: self.record.name.clone(),
                    reason: format!(
                        "bound as {} but the plugin implements {}",
                        self.record.job,
                        instance.job()
                    ),
                });
            }
            self.instance = Some(instance);
        }
        self.instance
            .as_ref()
            .ok_or_else(|| QuorumError::UnknownPlugin {
                name: self.record.name.clone(),
            })
    }
}

impl fmt::Debug for PluginBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBinding")
            .field("record", &self.record)
            .field("instantiated", &self.instance.is_some())
            .finish()
    }
}
