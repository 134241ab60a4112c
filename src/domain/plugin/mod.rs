//! Decision plugins and the three-stage plugin pipeline contract.
//!
//! A plugin participates in exactly one [`PluginJob`]. BEFORE_EVALUATION and
//! AFTER_EVALUATION plugins implement [`TablePlugin`]; the single
//! CREATE_ORDER plugin of a profile implements [`OrderPlugin`]. Tables are
//! moved through the stages by value so no stage can hold on to a table a
//! later stage is editing.

pub mod mean_threshold;
pub mod performance_weight;
pub mod signal_overlay;

use std::collections::HashMap;

use crate::domain::binding::{BindingId, ComponentBinding, PluginJob};
use crate::domain::confidence::{ConfidenceTable, Order};
use crate::domain::error::QuorumError;
use crate::domain::ohlcv::OhlcvBar;

/// Price slice per component binding for one evaluation.
pub type SliceMap<'a> = HashMap<BindingId, &'a [OhlcvBar]>;

/// What a plugin may see and touch while it runs.
pub struct PluginContext<'a> {
    pub profile: &'a str,
    /// Id of the plugin binding being run.
    pub binding_id: BindingId,
    pub buy_limit: f64,
    pub sell_limit: f64,
    pub components: &'a mut [ComponentBinding],
    pub slices: &'a SliceMap<'a>,
}

pub trait TablePlugin: Send {
    fn run(&self, ctx: &mut PluginContext<'_>, table: ConfidenceTable) -> Result<ConfidenceTable, QuorumError>;
}

pub trait OrderPlugin: Send {
    fn create_order(&self, ctx: &PluginContext<'_>, table: ConfidenceTable) -> Result<Order, QuorumError>;
}

pub enum PluginInstance {
    BeforeEvaluation(Box<dyn TablePlugin>),
    AfterEvaluation(Box<dyn TablePlugin>),
    CreateOrder(Box<dyn OrderPlugin>),
}

impl PluginInstance {
    pub fn job(&self) -> PluginJob {
        match self {
            PluginInstance::BeforeEvaluation(_) => PluginJob::BeforeEvaluation,
            PluginInstance::AfterEvaluation(_) => PluginJob::AfterEvaluation,
            PluginInstance::CreateOrder(_) => PluginJob::CreateOrder,
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PluginInstance({})", self.job())
    }
}
