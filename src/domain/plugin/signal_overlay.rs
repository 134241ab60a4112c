//! AFTER_EVALUATION plugin merging externally supplied per-ticker scores.
//!
//! Settings: `{"scores": {"TICKER": score, ...}}`. Each score lands under the
//! plugin's own key, next to the component scores.

use std::collections::BTreeMap;

use crate::domain::confidence::{ConfidenceTable, SignalKey};
use crate::domain::error::QuorumError;
use crate::domain::plugin::{PluginContext, TablePlugin};
use crate::domain::settings::Settings;

pub const NAME: &str = "signal_overlay";

#[derive(Debug, Clone, PartialEq)]
pub struct SignalOverlay {
    pub scores: BTreeMap<String, f64>,
}

impl SignalOverlay {
    pub fn from_settings(settings: &Settings) -> Result<Self, QuorumError> {
        let invalid = |reason: &str| QuorumError::InvalidSettings {
            name: NAME.to_string(),
            reason: reason.to_string(),
        };
        let mut scores = BTreeMap::new();
        if let Some(raw) = settings.get("scores") {
            let map = raw.as_object().ok_or_else(|| invalid("'scores' must be an object"))?;
            for (ticker, value) in map {
                let score = value
                    .as_f64()
                    .filter(|s| s.is_finite())
                    .ok_or_else(|| invalid("scores must be finite numbers"))?;
                scores.insert(ticker.clone(), score);
            }
        }
        Ok(Self { scores })
    }
}

impl TablePlugin for SignalOverlay {
    fn run(&self, ctx: &mut PluginContext<'_>, mut table: ConfidenceTable) -> Result<ConfidenceTable, QuorumError> {
        for (ticker, score) in &self.scores {
            table.insert(ticker, SignalKey::Plugin(ctx.binding_id), *score);
        }
        Ok(table)
    }
}
