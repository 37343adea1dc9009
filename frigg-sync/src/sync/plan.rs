//! Matching and partitioning for the initial sync.

use std::collections::{HashMap, HashSet};

use crate::record::SyncRecord;

/// Drop records whose match data is blank. Returns how many were dropped.
pub fn drop_missing_match_data(records: &mut Vec<SyncRecord>) -> usize {
    let before = records.len();
    records.retain(|r| !r.missing_match_data);
    before - records.len()
}

/// Keep only the first record of each match signature, preserving order.
/// Returns how many were dropped.
pub fn dedupe_by_match_hash(records: &mut Vec<SyncRecord>) -> usize {
    let before = records.len();
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.match_hash.clone()));
    before - records.len()
}

/// Keep only the last record for each data identifier, preserving order.
/// Returns how many were dropped.
pub fn keep_last_per_identifier(records: &mut Vec<SyncRecord>) -> usize {
    let before = records.len();
    let last: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.data_identifier_hash.clone(), i))
        .collect();
    let mut idx = 0;
    records.retain(|r| {
        let keep = last.get(&r.data_identifier_hash) == Some(&idx);
        idx += 1;
        keep
    });
    before - records.len()
}

/// The four sets an initial sync works from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Primary records with a match in the secondary.
    pub primary_intersection: Vec<SyncRecord>,
    /// Secondary records with a match in `primary_intersection`.
    pub secondary_intersection: Vec<SyncRecord>,
    /// Primary records missing from the secondary; created secondary-side.
    pub secondary_create: Vec<SyncRecord>,
    /// Secondary records missing from the primary; created primary-side.
    pub primary_create: Vec<SyncRecord>,
}

impl Partition {
    /// Index into `secondary_intersection` of the first match for `primary`.
    pub fn secondary_match(&self, primary: &SyncRecord) -> Option<usize> {
        self.secondary_intersection
            .iter()
            .position(|s| s.equals(primary))
    }
}

/// Split both record sets by match signature.
///
/// Secondary intersection membership is decided against the primary
/// intersection, not the full primary set.
pub fn partition(primary: Vec<SyncRecord>, secondary: Vec<SyncRecord>) -> Partition {
    let primary_hashes: HashSet<String> = primary.iter().map(|r| r.match_hash.clone()).collect();
    let secondary_hashes: HashSet<String> =
        secondary.iter().map(|r| r.match_hash.clone()).collect();

    let (primary_intersection, secondary_create): (Vec<_>, Vec<_>) = primary
        .into_iter()
        .partition(|r| secondary_hashes.contains(&r.match_hash));

    let intersection_hashes: HashSet<&str> = primary_intersection
        .iter()
        .map(|r| r.match_hash.as_str())
        .collect();

    let mut secondary_intersection = Vec::new();
    let mut primary_create = Vec::new();
    for record in secondary {
        if intersection_hashes.contains(record.match_hash.as_str()) {
            secondary_intersection.push(record);
        } else if !primary_hashes.contains(&record.match_hash) {
            primary_create.push(record);
        }
    }

    Partition {
        primary_intersection,
        secondary_intersection,
        secondary_create,
        primary_create,
    }
}
