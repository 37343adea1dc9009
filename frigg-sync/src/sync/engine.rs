//! The sync manager: reconciliation passes between two collaborators.
//!
//! This module provides the main `SyncManager` struct that runs full
//! (`initial_sync`) and incremental (`sync`) reconciliation between a
//! primary and a secondary collaborator, persisting pairings in a
//! [`SyncStateStore`].

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::record::{HashOptions, RecordConfig, SyncRecord};
use crate::state::{DataIdentifier, SyncState, SyncStateDraft, SyncStateStore};

use super::collaborator::{Integration, ModuleCollaborator};
use super::conflict::merge_records;
use super::plan::{
    dedupe_by_match_hash, drop_missing_match_data, keep_last_per_identifier, partition,
};
use super::types::{InitialSyncReport, SyncManagerConfig, SyncOutcome};

/// Orchestrates reconciliation for one record type between two systems.
///
/// Callers must ensure at most one manager runs per (primary, secondary)
/// pair at a time: the one-pairing-per-identifier rule is checked by
/// querying before writing, not by locking.
pub struct SyncManager {
    /// Record type being synchronized.
    record_config: Arc<RecordConfig>,
    /// Primary and secondary collaborators.
    integration: Integration,
    /// Pairing storage.
    store: Arc<dyn SyncStateStore>,
    /// Reconciliation options.
    config: SyncManagerConfig,
}

impl SyncManager {
    /// Create a manager with default options.
    pub fn new(
        record_config: Arc<RecordConfig>,
        integration: Integration,
        store: Arc<dyn SyncStateStore>,
    ) -> Self {
        Self {
            record_config,
            integration,
            store,
            config: SyncManagerConfig::default(),
        }
    }

    /// Create with custom options.
    pub fn with_config(mut self, config: SyncManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the reconciliation options.
    pub fn config(&self) -> &SyncManagerConfig {
        &self.config
    }

    /// Get the record configuration.
    pub fn record_config(&self) -> &Arc<RecordConfig> {
        &self.record_config
    }

    /// Get the collaborators.
    pub fn integration(&self) -> &Integration {
        &self.integration
    }

    /// Get the pairing store.
    pub fn store(&self) -> &Arc<dyn SyncStateStore> {
        &self.store
    }

    fn hash_options(&self) -> HashOptions {
        self.config.hash_options()
    }

    /// Full reconciliation of both collaborators.
    ///
    /// Fetches every record from both sides, matches them, merges matched
    /// pairs field by field, records a pairing for every record, then sends
    /// the resulting updates and creates to each side. A failing
    /// collaborator call aborts the pass; work already confirmed stays
    /// confirmed.
    #[instrument(skip(self), fields(record = %self.record_config.name))]
    pub async fn initial_sync(&self) -> Result<InitialSyncReport> {
        let started = Instant::now();
        let primary = &self.integration.primary;
        let secondary = &self.integration.secondary;
        let unidirectional = self.config.is_unidirectional_sync;
        let mut report = InitialSyncReport::default();

        let (primary_entity, secondary_entity) =
            futures::try_join!(primary.entity_id(), secondary.entity_id())?;

        let fetch_started = Instant::now();
        let mut primary_records = primary.get_all_sync_objects(&self.record_config).await?;
        report.primary_fetched = primary_records.len();
        debug!(
            module = primary.name(),
            count = primary_records.len(),
            elapsed_ms = fetch_started.elapsed().as_millis() as u64,
            "Fetched primary records"
        );

        let fetch_started = Instant::now();
        let mut secondary_records = secondary.get_all_sync_objects(&self.record_config).await?;
        report.secondary_fetched = secondary_records.len();
        debug!(
            module = secondary.name(),
            count = secondary_records.len(),
            elapsed_ms = fetch_started.elapsed().as_millis() as u64,
            "Fetched secondary records"
        );

        if self.config.ignore_empty_match_values {
            report.primary_ignored = drop_missing_match_data(&mut primary_records);
            report.secondary_ignored = drop_missing_match_data(&mut secondary_records);
            debug!(
                primary = report.primary_ignored,
                secondary = report.secondary_ignored,
                "Ignored records with empty match values"
            );
        }

        if self.config.use_first_matching_duplicate {
            report.primary_duplicates = dedupe_by_match_hash(&mut primary_records);
            report.secondary_duplicates = dedupe_by_match_hash(&mut secondary_records);
            debug!(
                primary_remaining = primary_records.len(),
                secondary_remaining = secondary_records.len(),
                "Removed duplicate match signatures"
            );
        }

        let sort_started = Instant::now();
        let mut plan = partition(primary_records, secondary_records);
        let mut primary_update_idx = Vec::new();
        let mut secondary_update_idx: Vec<usize> = Vec::new();
        let pair_entities = [primary_entity.clone(), secondary_entity.clone()];

        for i in 0..plan.primary_intersection.len() {
            let Some(j) = plan.secondary_match(&plan.primary_intersection[i]) else {
                continue;
            };
            let primary_record = &mut plan.primary_intersection[i];
            let secondary_record = &mut plan.secondary_intersection[j];

            let outcome = merge_records(primary_record, secondary_record, unidirectional);
            if outcome.primary_changed && !unidirectional {
                primary_update_idx.push(i);
            }
            if outcome.secondary_changed && !secondary_update_idx.contains(&j) {
                secondary_update_idx.push(j);
            }

            let state = self
                .create_sync_state(&[&*primary_record, &*secondary_record], &pair_entities)
                .await?;
            primary_record.set_sync_id(state.id.clone());
            secondary_record.set_sync_id(state.id);
            report.states_written += 1;
        }
        report.matched = plan.primary_intersection.len();
        debug!(
            matched = report.matched,
            primary_update = primary_update_idx.len(),
            primary_create = plan.primary_create.len(),
            secondary_update = secondary_update_idx.len(),
            secondary_create = plan.secondary_create.len(),
            elapsed_ms = sort_started.elapsed().as_millis() as u64,
            "Sorting complete"
        );

        let states_started = Instant::now();
        if !unidirectional {
            let entities = [secondary_entity.clone(), primary_entity.clone()];
            for record in &mut plan.primary_create {
                let state = self.create_sync_state(&[&*record], &entities).await?;
                record.set_sync_id(state.id);
                report.states_written += 1;
            }
        }
        for record in &mut plan.secondary_create {
            let state = self.create_sync_state(&[&*record], &pair_entities).await?;
            record.set_sync_id(state.id);
            report.states_written += 1;
        }
        debug!(
            elapsed_ms = states_started.elapsed().as_millis() as u64,
            "Sync states created for unmatched records"
        );

        let primary_update: Vec<SyncRecord> = primary_update_idx
            .iter()
            .map(|&i| plan.primary_intersection[i].clone())
            .collect();
        let secondary_update: Vec<SyncRecord> = secondary_update_idx
            .iter()
            .map(|&j| plan.secondary_intersection[j].clone())
            .collect();

        if !unidirectional {
            report.primary_updated = primary_update.len();
            report.primary_created = plan.primary_create.len();
            self.apply_updates(primary.as_ref(), primary_update).await?;
            self.apply_creates(primary.as_ref(), plan.primary_create).await?;
        }

        report.secondary_updated = secondary_update.len();
        report.secondary_created = plan.secondary_create.len();
        self.apply_updates(secondary.as_ref(), secondary_update).await?;
        self.apply_creates(secondary.as_ref(), plan.secondary_create).await?;

        report.elapsed = started.elapsed();
        info!(
            matched = report.matched,
            primary_updated = report.primary_updated,
            primary_created = report.primary_created,
            secondary_updated = report.secondary_updated,
            secondary_created = report.secondary_created,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Initial sync complete"
        );

        Ok(report)
    }

    async fn apply_updates(
        &self,
        collaborator: &dyn ModuleCollaborator,
        records: Vec<SyncRecord>,
    ) -> Result<Vec<Value>> {
        let started = Instant::now();
        let count = records.len();
        let results = collaborator.batch_update_sync_objects(records, self).await?;
        debug!(
            module = collaborator.name(),
            count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch update applied"
        );
        Ok(results)
    }

    async fn apply_creates(
        &self,
        collaborator: &dyn ModuleCollaborator,
        records: Vec<SyncRecord>,
    ) -> Result<Vec<Value>> {
        let started = Instant::now();
        let count = records.len();
        let results = collaborator.batch_create_sync_objects(records, self).await?;
        debug!(
            module = collaborator.name(),
            count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch create applied"
        );
        Ok(results)
    }

    /// Create or replace the pairing for `records`.
    ///
    /// The first record supplies the name and content hash; each record's
    /// identifier is paired with the entity at the same position. An
    /// existing pairing holding the first record's identifier for
    /// `entities[0]` is overwritten.
    pub async fn create_sync_state(
        &self,
        records: &[&SyncRecord],
        entities: &[String],
    ) -> Result<SyncState> {
        let first = records
            .first()
            .ok_or_else(|| Error::Internal("cannot create a sync state without records".into()))?;

        let data_identifiers = records
            .iter()
            .zip(entities)
            .map(|(record, entity)| DataIdentifier {
                entity: entity.clone(),
                id: record.data_identifier.clone(),
                hash: record.data_identifier_hash.clone(),
            })
            .collect();

        let draft = SyncStateDraft {
            name: first.name().to_string(),
            entities: entities.to_vec(),
            hash: first.hash_data(self.hash_options()),
            data_identifiers,
        };

        self.store.upsert(draft).await
    }

    /// Incremental reconciliation of changed primary records.
    ///
    /// Each record is looked up by its primary identifier. Unknown records
    /// get a new pairing and are created on the secondary; linked records
    /// whose hash changed are updated on the secondary; linked records with
    /// an unchanged hash are reported as unchanged. A pairing whose
    /// secondary create never completed is treated as a create again.
    /// When several records share a data identifier, only the last one is
    /// synced.
    ///
    /// Returns update results, then create results, then unchanged states.
    #[instrument(skip(self, records), fields(record = %self.record_config.name, count = records.len()))]
    pub async fn sync(&self, mut records: Vec<SyncRecord>) -> Result<Vec<SyncOutcome>> {
        let collapsed = keep_last_per_identifier(&mut records);
        if collapsed > 0 {
            debug!(collapsed, "Dropped earlier records with a repeated data identifier");
        }

        let secondary = &self.integration.secondary;
        let (primary_entity, secondary_entity) =
            futures::try_join!(self.integration.primary.entity_id(), secondary.entity_id())?;
        let pair_entities = [primary_entity.clone(), secondary_entity.clone()];

        let mut batch_updates = Vec::new();
        let mut batch_creates = Vec::new();
        let mut no_change = Vec::new();

        for mut record in records {
            let data_hash = record.hash_data(self.hash_options());
            let existing = self
                .store
                .get_sync_object(record.name(), &record.data_identifier, &primary_entity)
                .await?;

            match existing {
                Some(state) if !state.is_linked() => {
                    debug!(sync_id = %state.id, "Secondary record never created; creating");
                    record.set_sync_id(state.id);
                    batch_creates.push(record);
                }
                Some(state) if state.hash == data_hash => {
                    debug!(sync_id = %state.id, "Data hashes match; nothing to do");
                    no_change.push(state);
                }
                Some(state) => {
                    debug!(sync_id = %state.id, "Hash changed; updating secondary");
                    let secondary_id = state.data_identifier_for(&secondary_entity)?.clone();
                    let mut secondary_record = SyncRecord::from_data(
                        Arc::clone(record.config()),
                        secondary.name(),
                        secondary_id,
                        record.data,
                    );
                    secondary_record.set_sync_id(state.id);
                    batch_updates.push(secondary_record);
                }
                None => {
                    debug!("No sync state; creating pairing");
                    let state = self.create_sync_state(&[&record], &pair_entities).await?;
                    record.set_sync_id(state.id);
                    batch_creates.push(record);
                }
            }
        }

        let updated = if batch_updates.is_empty() {
            Vec::new()
        } else {
            self.apply_updates(secondary.as_ref(), batch_updates).await?
        };
        let created = if batch_creates.is_empty() {
            Vec::new()
        } else {
            self.apply_creates(secondary.as_ref(), batch_creates).await?
        };

        info!(
            updated = updated.len(),
            created = created.len(),
            unchanged = no_change.len(),
            "Incremental sync complete"
        );

        Ok(updated
            .into_iter()
            .map(SyncOutcome::Updated)
            .chain(created.into_iter().map(SyncOutcome::Created))
            .chain(no_change.into_iter().map(SyncOutcome::Unchanged))
            .collect())
    }

    /// Record that `collaborator` created `record` under `created_id`.
    ///
    /// Stores the record's hash and links the new identifier in a single
    /// write.
    pub async fn confirm_create(
        &self,
        record: &SyncRecord,
        created_id: Value,
        collaborator: &dyn ModuleCollaborator,
    ) -> Result<SyncState> {
        let sync_id = record.sync_id.as_ref().ok_or_else(|| Error::MissingSyncId {
            name: record.name().to_string(),
        })?;
        let entity = collaborator.entity_id().await?;
        let identifier = DataIdentifier::new(entity, created_id);

        let state = self
            .store
            .confirm_link(sync_id, &record.hash_data(self.hash_options()), identifier)
            .await?;
        debug!(sync_id = %state.id, module = collaborator.name(), "Create confirmed");
        Ok(state)
    }

    /// Record that `record` was updated successfully.
    pub async fn confirm_update(&self, record: &SyncRecord) -> Result<SyncState> {
        let sync_id = record.sync_id.as_ref().ok_or_else(|| Error::MissingSyncId {
            name: record.name().to_string(),
        })?;

        let state = self
            .store
            .update_hash(sync_id, &record.hash_data(self.hash_options()))
            .await?;
        debug!(sync_id = %state.id, "Update confirmed");
        Ok(state)
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("record", &self.record_config.name)
            .field("integration", &self.integration)
            .field("config", &self.config)
            .finish()
    }
}
