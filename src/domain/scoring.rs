//! Scoring pipeline: runs every bound component against its slice.

use crate::domain::binding::ComponentBinding;
use crate::domain::confidence::{ConfidenceTable, SignalKey};
use crate::domain::error::QuorumError;
use crate::domain::plugin::SliceMap;
use crate::domain::registry::Registry;

/// Score each binding on its slice, weight it and write it into `table`
/// under `Component(binding id)`. Every ticker in `held` gets a row even
/// when nothing scores it.
pub fn score_components<'t>(
    mut table: ConfidenceTable,
    components: &mut [ComponentBinding],
    registry: &Registry,
    slices: &SliceMap<'_>,
    held: impl IntoIterator<Item = &'t str>,
) -> Result<ConfidenceTable, QuorumError> {
    for binding in components.iter_mut() {
        let id = binding.id();
        let bars = slices.get(&id).ok_or_else(|| QuorumError::NoData {
            ticker: binding.record.ticker.clone(),
            interval: binding.record.interval.to_string(),
        })?;
        let weight = binding.record.weight;
        let ticker = binding.record.ticker.clone();
        let name = binding.record.name.clone();

        let raw = binding.scorer(registry)?.score(bars)?;
        if !raw.is_finite() {
            return Err(QuorumError::Scoring {
                component: name,
                reason: format!("non-finite score {} for {}", raw, ticker),
            });
        }
        table.insert(&ticker, SignalKey::Component(id), raw * weight);
    }

    for ticker in held {
        table.ensure_ticker(ticker);
    }
    Ok(table)
}
