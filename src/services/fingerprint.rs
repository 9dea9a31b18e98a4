//! Alert fingerprint index
//!
//! The fingerprint is the sole join key between the two systems. The index
//! maps each member-alert fingerprint to the group that referenced it; when
//! the same fingerprint appears in several eligible groups the last one in
//! input order wins, which is safe because resolving an already-resolved
//! group is a no-op upstream.

use std::collections::HashMap;

use crate::models::AlertGroup;

/// Which groups contribute to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Reconciliation: resolved groups are excluded so stale fingerprints
    /// cannot cause spurious resolve calls
    SkipResolved,
    /// Metrics enrichment: any non-empty group may contribute
    All,
}

/// Build a fingerprint → group lookup for one snapshot
pub fn fingerprint_index(groups: &[AlertGroup], mode: IndexMode) -> HashMap<&str, &AlertGroup> {
    let mut index = HashMap::new();

    for group in groups {
        if mode == IndexMode::SkipResolved && group.is_resolved() {
            continue;
        }
        for fingerprint in group.fingerprints() {
            index.insert(fingerprint, group);
        }
    }

    index
}
