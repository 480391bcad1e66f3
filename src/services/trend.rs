//! Period-over-period trend partition.

use std::collections::BTreeSet;

use crate::errors::EngineError;
use crate::models::Catalog;
use crate::services::baseline::BaselineSource;

/// Partition of the current cycle's plugin ids against the previous cycle.
///
/// `still_open` and `new` are exhaustive and disjoint over the current ids;
/// `resolved` is derivable only (previous minus current) since no forward
/// state is stored.
#[derive(Debug, Clone, Default)]
pub struct TrendDiff {
    pub still_open: BTreeSet<u32>,
    pub new: BTreeSet<u32>,
    pub resolved: BTreeSet<u32>,
}

impl TrendDiff {
    /// Partition arbitrary id sets. An empty `previous` set is the first-run
    /// case: every current id is new.
    pub fn partition(current: &BTreeSet<u32>, previous: &BTreeSet<u32>) -> Self {
        let still_open: BTreeSet<u32> = current.intersection(previous).copied().collect();
        let new: BTreeSet<u32> = current.difference(previous).copied().collect();
        let resolved: BTreeSet<u32> = previous.difference(current).copied().collect();
        Self {
            still_open,
            new,
            resolved,
        }
    }

    pub fn is_carryover(&self, plugin_id: u32) -> bool {
        self.still_open.contains(&plugin_id)
    }
}

/// Diff the current catalog against the previous cycle's baseline.
pub fn diff(current: &Catalog, baseline: &dyn BaselineSource) -> Result<TrendDiff, EngineError> {
    let previous = baseline.plugin_ids()?;
    let current_ids = current.reportable_plugin_ids();
    let diff = TrendDiff::partition(&current_ids, &previous);
    tracing::info!(
        still_open = diff.still_open.len(),
        new = diff.new.len(),
        resolved = diff.resolved.len(),
        "Computed cycle trend"
    );
    Ok(diff)
}
