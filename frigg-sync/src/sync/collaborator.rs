//! The contract an external system adapter fulfils for the sync engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::record::{RecordConfig, SyncRecord};

use super::engine::SyncManager;

/// One side of a sync pair.
///
/// Batch calls receive the whole batch at once; any internal parallelism is
/// the collaborator's business. After each record is applied successfully
/// the collaborator confirms it back through the manager:
/// [`SyncManager::confirm_update`] for updates and
/// [`SyncManager::confirm_create`] with the new external id for creates.
#[async_trait]
pub trait ModuleCollaborator: Send + Sync {
    /// Module name, used for logging and as the record module name.
    fn name(&self) -> &str;

    /// Stable id of the connected entity on this side.
    async fn entity_id(&self) -> Result<String>;

    /// Every record of the configured type this side holds.
    async fn get_all_sync_objects(&self, config: &Arc<RecordConfig>) -> Result<Vec<SyncRecord>>;

    /// Apply updates.
    async fn batch_update_sync_objects(
        &self,
        records: Vec<SyncRecord>,
        manager: &SyncManager,
    ) -> Result<Vec<Value>>;

    /// Apply creates.
    async fn batch_create_sync_objects(
        &self,
        records: Vec<SyncRecord>,
        manager: &SyncManager,
    ) -> Result<Vec<Value>>;
}

/// The two collaborators of an integration.
#[derive(Clone)]
pub struct Integration {
    pub primary: Arc<dyn ModuleCollaborator>,
    pub secondary: Arc<dyn ModuleCollaborator>,
}

impl Integration {
    /// Pair a primary and a secondary collaborator.
    pub fn new(primary: Arc<dyn ModuleCollaborator>, secondary: Arc<dyn ModuleCollaborator>) -> Self {
        Self { primary, secondary }
    }
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .finish()
    }
}
