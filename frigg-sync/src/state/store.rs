//! Sync state storage trait and in-memory implementation.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::hashing::hash_json;

use super::types::{DataIdentifier, SyncState, SyncStateDraft, SyncStateId};

/// Durable storage for sync states.
///
/// Implementations only need to answer raw queries; the "at most one state
/// per `(name, data identifier, entity)`" rule is enforced once, in
/// [`SyncStateStore::get_sync_object`].
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// All states named `name` holding `data_identifier` for `entity`.
    async fn find_matching(
        &self,
        name: &str,
        data_identifier: &Value,
        entity: &str,
    ) -> Result<Vec<SyncState>>;

    /// Fetch a state by id.
    async fn get(&self, id: &SyncStateId) -> Result<Option<SyncState>>;

    /// Create a state, or overwrite the one the draft targets.
    async fn upsert(&self, draft: SyncStateDraft) -> Result<SyncState>;

    /// Replace a state's content hash.
    async fn update_hash(&self, id: &SyncStateId, hash: &str) -> Result<SyncState>;

    /// Set the content hash and link an identifier in one atomic write.
    async fn confirm_link(
        &self,
        id: &SyncStateId,
        hash: &str,
        identifier: DataIdentifier,
    ) -> Result<SyncState>;

    /// The single state for `(name, data_identifier, entity)`, if any.
    ///
    /// More than one match is corrupted pairing data and fails with
    /// [`Error::AmbiguousSyncState`].
    async fn get_sync_object(
        &self,
        name: &str,
        data_identifier: &Value,
        entity: &str,
    ) -> Result<Option<SyncState>> {
        let mut matches = self.find_matching(name, data_identifier, entity).await?;
        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            count => Err(Error::ambiguous_sync_state(name, entity, count)),
        }
    }
}

/// Sync state store held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySyncStateStore {
    states: RwLock<Vec<SyncState>>,
}

impl InMemorySyncStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a state as-is, bypassing the upsert key.
    pub async fn insert(&self, state: SyncState) {
        self.states.write().await.push(state);
    }

    /// Snapshot of every stored state.
    pub async fn all(&self) -> Vec<SyncState> {
        self.states.read().await.clone()
    }

    /// Number of stored states.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }

    async fn modify<F>(&self, id: &SyncStateId, f: F) -> Result<SyncState>
    where
        F: FnOnce(&mut SyncState) + Send,
    {
        let mut states = self.states.write().await;
        let state = states
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::SyncStateNotFound(id.to_string()))?;
        f(state);
        Ok(state.clone())
    }
}

#[async_trait]
impl SyncStateStore for InMemorySyncStateStore {
    async fn find_matching(
        &self,
        name: &str,
        data_identifier: &Value,
        entity: &str,
    ) -> Result<Vec<SyncState>> {
        let id_hash = hash_json(data_identifier);
        Ok(self
            .states
            .read()
            .await
            .iter()
            .filter(|s| s.name == name && s.has_identifier(entity, &id_hash))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &SyncStateId) -> Result<Option<SyncState>> {
        Ok(self.states.read().await.iter().find(|s| &s.id == id).cloned())
    }

    async fn upsert(&self, draft: SyncStateDraft) -> Result<SyncState> {
        let mut states = self.states.write().await;

        let mut targeted = Vec::new();
        for (idx, state) in states.iter().enumerate() {
            if draft.targets(state)? {
                targeted.push(idx);
            }
        }

        match targeted.as_slice() {
            [] => {
                let state = SyncState::from_draft(draft);
                states.push(state.clone());
                Ok(state)
            }
            [idx] => {
                let state = &mut states[*idx];
                state.apply_draft(draft);
                Ok(state.clone())
            }
            many => {
                let (entity, _) = draft.key()?;
                Err(Error::ambiguous_sync_state(&draft.name, entity, many.len()))
            }
        }
    }

    async fn update_hash(&self, id: &SyncStateId, hash: &str) -> Result<SyncState> {
        self.modify(id, |state| state.set_hash(hash)).await
    }

    async fn confirm_link(
        &self,
        id: &SyncStateId,
        hash: &str,
        identifier: DataIdentifier,
    ) -> Result<SyncState> {
        self.modify(id, move |state| {
            state.set_hash(hash);
            state.link(identifier);
        })
        .await
    }
}
