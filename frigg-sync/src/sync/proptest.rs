//! Property-based tests for matching and conflict resolution using proptest.
//!
//! These tests check the invariants the reconciliation passes rely on:
//!
//! - Content hashes follow configured key order, not data insertion order
//! - Filtering and de-duplication only ever remove records, keeping the first
//! - Partitioning accounts for every primary record exactly once
//! - A non-blank primary value always survives a conflict

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    use crate::record::value::is_replaceable;
    use crate::record::{HashOptions, RecordConfig, SyncRecord};
    use crate::sync::conflict::{resolve_conflict, values_equivalent};
    use crate::sync::plan::{dedupe_by_match_hash, drop_missing_match_data, partition};

    const KEYS: [&str; 3] = ["email", "name", "phone"];

    fn config() -> Arc<RecordConfig> {
        Arc::new(
            RecordConfig::new("Contact")
                .with_keys(KEYS)
                .with_match_on(["email"]),
        )
    }

    // Field values, biased towards blanks and collisions
    fn field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(json!("")),
            "[a-c]{1,2}".prop_map(Value::from),
            (0i64..3).prop_map(Value::from),
        ]
    }

    fn values() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(field_value(), KEYS.len())
    }

    fn record(module: &str, id: usize, values: &[Value], reversed: bool) -> SyncRecord {
        let mut pairs: Vec<(String, Value)> = KEYS
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        if reversed {
            pairs.reverse();
        }
        let data: Map<String, Value> = pairs.into_iter().collect();
        SyncRecord::from_data(config(), module, json!(id), data)
    }

    fn records(module: &'static str) -> impl Strategy<Value = Vec<SyncRecord>> {
        prop::collection::vec(values(), 0..12).prop_map(move |rows| {
            rows.iter()
                .enumerate()
                .map(|(i, row)| record(module, i, row, false))
                .collect()
        })
    }

    // =========================================================================
    // Hashing Properties
    // =========================================================================

    proptest! {
        /// The content hash ignores the order fields were inserted in.
        #[test]
        fn hash_ignores_insertion_order(row in values(), omit in any::<bool>()) {
            let options = HashOptions::omitting_empty_strings(omit);
            let forward = record("p", 1, &row, false);
            let backward = record("p", 1, &row, true);
            prop_assert_eq!(forward.hash_data(options), backward.hash_data(options));
        }

        /// With empty strings omitted, `""` and `null` hash alike.
        #[test]
        fn omitted_empty_strings_hash_as_null(row in values()) {
            let blanked: Vec<Value> = row
                .iter()
                .map(|v| if v.as_str() == Some("") { Value::Null } else { v.clone() })
                .collect();
            let options = HashOptions::omitting_empty_strings(true);
            prop_assert_eq!(
                record("p", 1, &row, false).hash_data(options),
                record("p", 1, &blanked, false).hash_data(options)
            );
        }
    }

    // =========================================================================
    // Matching Properties
    // =========================================================================

    proptest! {
        /// Filtering leaves only records with complete match data.
        #[test]
        fn filtering_drops_only_missing_match_data(mut rows in records("p")) {
            let before = rows.len();
            let expected = rows.iter().filter(|r| !r.missing_match_data).count();
            let dropped = drop_missing_match_data(&mut rows);
            prop_assert_eq!(rows.len(), expected);
            prop_assert_eq!(dropped, before - expected);
        }

        /// De-duplication keeps the first record of every match signature.
        #[test]
        fn dedupe_keeps_first_of_each_signature(rows in records("p")) {
            let mut seen = HashSet::new();
            let expected: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, r)| seen.insert(r.match_hash.clone()))
                .map(|(i, _)| i)
                .collect();

            let mut deduped = rows.clone();
            dedupe_by_match_hash(&mut deduped);

            let kept: Vec<usize> = deduped
                .iter()
                .filter_map(|r| r.data_identifier.as_u64().map(|id| id as usize))
                .collect();
            prop_assert_eq!(kept, expected);
        }

        /// Every primary record lands in exactly one primary-side set, and every
        /// matched secondary has a matching primary.
        #[test]
        fn partition_accounts_for_primary(primary in records("p"), secondary in records("s")) {
            let primary_len = primary.len();
            let secondary_len = secondary.len();
            let plan = partition(primary, secondary);

            prop_assert_eq!(
                plan.primary_intersection.len() + plan.secondary_create.len(),
                primary_len
            );
            prop_assert!(
                plan.secondary_intersection.len() + plan.primary_create.len() <= secondary_len
            );
            for record in &plan.secondary_intersection {
                prop_assert!(plan.primary_intersection.iter().any(|p| p.equals(record)));
            }
            for record in &plan.primary_intersection {
                prop_assert!(plan.secondary_match(record).is_some());
            }
        }
    }

    // =========================================================================
    // Conflict Properties
    // =========================================================================

    proptest! {
        /// A non-blank primary value that differs is pushed to the secondary.
        #[test]
        fn non_blank_primary_wins(
            primary in field_value(),
            secondary in field_value(),
            unidirectional in any::<bool>()
        ) {
            let resolution = resolve_conflict("k", &primary, &secondary, unidirectional);
            if !values_equivalent(&primary, &secondary) && !is_replaceable(&primary) {
                prop_assert_eq!(&resolution.secondary_value, &primary);
                prop_assert!(resolution.secondary_changed);
                prop_assert!(!resolution.primary_changed);
            }
        }

        /// Unidirectional resolution never changes the primary.
        #[test]
        fn unidirectional_never_changes_primary(
            primary in field_value(),
            secondary in field_value()
        ) {
            let resolution = resolve_conflict("k", &primary, &secondary, true);
            prop_assert!(!resolution.primary_changed);
            prop_assert_eq!(resolution.primary_value, primary);
        }

        /// Equivalent values are never touched.
        #[test]
        fn equivalent_values_untouched(
            primary in field_value(),
            secondary in field_value(),
            unidirectional in any::<bool>()
        ) {
            prop_assume!(values_equivalent(&primary, &secondary));
            let resolution = resolve_conflict("k", &primary, &secondary, unidirectional);
            prop_assert!(!resolution.primary_changed && !resolution.secondary_changed);
        }
    }
}
