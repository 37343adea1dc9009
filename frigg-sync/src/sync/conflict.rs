//! Field-level conflict resolution between matched records.
//!
//! The primary's non-blank value always wins. A blank primary value
//! (`null` or `""`) takes the secondary's value, unless the sync is
//! unidirectional, in which case the field is left as it is on both sides.

use serde_json::Value;

use crate::record::value::{deep_equal, is_falsy, is_replaceable, strict_equal};
use crate::record::SyncRecord;

/// Outcome of resolving one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResolution {
    pub primary_value: Value,
    pub secondary_value: Value,
    pub primary_changed: bool,
    pub secondary_changed: bool,
}

impl ConflictResolution {
    fn unchanged(primary: &Value, secondary: &Value) -> Self {
        Self {
            primary_value: primary.clone(),
            secondary_value: secondary.clone(),
            primary_changed: false,
            secondary_changed: false,
        }
    }
}

/// Whether two field values count as the same.
///
/// Checked in order: structural equality; if either side is a number,
/// strict equality (so `5` and `"5"` differ); otherwise both falsy.
pub fn values_equivalent(primary: &Value, secondary: &Value) -> bool {
    if deep_equal(primary, secondary) {
        true
    } else if primary.is_number() || secondary.is_number() {
        strict_equal(primary, secondary)
    } else {
        is_falsy(primary) && is_falsy(secondary)
    }
}

/// Decide which side's value survives for `key`.
pub fn resolve_conflict(
    key: &str,
    primary: &Value,
    secondary: &Value,
    unidirectional: bool,
) -> ConflictResolution {
    if values_equivalent(primary, secondary) {
        return ConflictResolution::unchanged(primary, secondary);
    }

    let primary_blank = is_replaceable(primary);
    if primary_blank && !is_replaceable(secondary) && !unidirectional {
        ConflictResolution {
            primary_value: secondary.clone(),
            secondary_value: secondary.clone(),
            primary_changed: true,
            secondary_changed: false,
        }
    } else if !primary_blank {
        ConflictResolution {
            primary_value: primary.clone(),
            secondary_value: primary.clone(),
            primary_changed: false,
            secondary_changed: true,
        }
    } else {
        tracing::trace!(key, unidirectional, "Blank primary value left unresolved");
        ConflictResolution::unchanged(primary, secondary)
    }
}

/// Which sides a merge modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub primary_changed: bool,
    pub secondary_changed: bool,
}

/// Resolve every key of the primary's data against a matched secondary.
///
/// Both records are modified in place.
pub fn merge_records(
    primary: &mut SyncRecord,
    secondary: &mut SyncRecord,
    unidirectional: bool,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let keys: Vec<String> = primary.data.keys().cloned().collect();

    for key in keys {
        let resolution = resolve_conflict(&key, primary.get(&key), secondary.get(&key), unidirectional);
        if resolution.primary_changed {
            primary.set(key.clone(), resolution.primary_value);
            outcome.primary_changed = true;
        }
        if resolution.secondary_changed {
            secondary.set(key, resolution.secondary_value);
            outcome.secondary_changed = true;
        }
    }

    outcome
}
