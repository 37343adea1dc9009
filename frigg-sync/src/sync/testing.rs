//! In-memory collaborator for exercising the manager.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::record::{FieldMap, RecordConfig, SyncRecord};

use super::collaborator::ModuleCollaborator;
use super::engine::SyncManager;

/// A collaborator backed by a fixed list of native payloads.
///
/// Every batch it receives is recorded. Applied records are confirmed back
/// through the manager unless confirmation is switched off; created records
/// get ids of the form `<name>-<n>`.
pub(crate) struct MockCollaborator {
    name: String,
    entity: String,
    mapper: FieldMap,
    payloads: Vec<(Value, Value)>,
    confirm: bool,
    fail_creates: bool,
    next_id: AtomicUsize,
    updates: Mutex<Vec<Vec<SyncRecord>>>,
    creates: Mutex<Vec<Vec<SyncRecord>>>,
}

impl MockCollaborator {
    pub fn new(name: &str, entity: &str, mapper: FieldMap) -> Self {
        Self {
            name: name.to_string(),
            entity: entity.to_string(),
            mapper,
            payloads: Vec::new(),
            confirm: true,
            fail_creates: false,
            next_id: AtomicUsize::new(1),
            updates: Mutex::new(Vec::new()),
            creates: Mutex::new(Vec::new()),
        }
    }

    pub fn with_payload(mut self, id: Value, payload: Value) -> Self {
        self.payloads.push((id, payload));
        self
    }

    pub fn without_confirmation(mut self) -> Self {
        self.confirm = false;
        self
    }

    pub fn failing_creates(mut self) -> Self {
        self.fail_creates = true;
        self
    }

    pub fn record(&self, config: &Arc<RecordConfig>, index: usize) -> SyncRecord {
        let (id, payload) = &self.payloads[index];
        SyncRecord::from_payload(config.clone(), &self.mapper, id.clone(), payload)
    }

    /// Every record received as an update, across batches.
    pub fn updated(&self) -> Vec<SyncRecord> {
        self.updates.lock().unwrap().iter().flatten().cloned().collect()
    }

    /// Every record received as a create, across batches.
    pub fn created(&self) -> Vec<SyncRecord> {
        self.creates.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn update_batches(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn create_batches(&self) -> usize {
        self.creates.lock().unwrap().len()
    }
}

#[async_trait]
impl ModuleCollaborator for MockCollaborator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entity_id(&self) -> Result<String> {
        Ok(self.entity.clone())
    }

    async fn get_all_sync_objects(&self, config: &Arc<RecordConfig>) -> Result<Vec<SyncRecord>> {
        Ok((0..self.payloads.len()).map(|i| self.record(config, i)).collect())
    }

    async fn batch_update_sync_objects(
        &self,
        records: Vec<SyncRecord>,
        manager: &SyncManager,
    ) -> Result<Vec<Value>> {
        self.updates.lock().unwrap().push(records.clone());

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            if self.confirm {
                manager.confirm_update(record).await?;
            }
            results.push(json!({
                "id": record.data_identifier,
                "payload": record.to_payload(&self.mapper),
            }));
        }
        Ok(results)
    }

    async fn batch_create_sync_objects(
        &self,
        records: Vec<SyncRecord>,
        manager: &SyncManager,
    ) -> Result<Vec<Value>> {
        self.creates.lock().unwrap().push(records.clone());
        if self.fail_creates && !records.is_empty() {
            return Err(Error::collaborator(&self.name, "remote rejected create"));
        }

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let id = json!(format!("{}-{}", self.name, n));
            if self.confirm {
                manager.confirm_create(record, id.clone(), self).await?;
            }
            results.push(json!({ "id": id }));
        }
        Ok(results)
    }
}
