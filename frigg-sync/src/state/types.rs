//! Sync state (pairing) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hashing::hash_json;

/// Unique identifier for a sync state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncStateId(pub String);

impl SyncStateId {
    /// Generate a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SyncStateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncStateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SyncStateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One side's native identifier for a paired entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIdentifier {
    /// Entity (connected account) the identifier belongs to.
    pub entity: String,
    /// The external system's identifier.
    pub id: Value,
    /// Canonical hash of `id`.
    pub hash: String,
}

impl DataIdentifier {
    /// Create an identifier, hashing `id`.
    pub fn new(entity: impl Into<String>, id: Value) -> Self {
        let hash = hash_json(&id);
        Self {
            entity: entity.into(),
            id,
            hash,
        }
    }

    /// Whether this identifier is `id` for `entity`.
    pub fn matches(&self, entity: &str, id_hash: &str) -> bool {
        self.entity == entity && self.hash == id_hash
    }
}

/// Durable pairing between two systems' records for one logical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub id: SyncStateId,
    /// Logical record-type name.
    pub name: String,
    /// The two owning entities, primary side first.
    pub entities: Vec<String>,
    /// Last known content hash.
    pub hash: String,
    /// Linked identifiers; two entries once both sides exist.
    pub data_identifiers: Vec<DataIdentifier>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Materialize a draft as a new state.
    pub fn from_draft(draft: SyncStateDraft) -> Self {
        let now = Utc::now();
        Self {
            id: SyncStateId::new(),
            name: draft.name,
            entities: draft.entities,
            hash: draft.hash,
            data_identifiers: draft.data_identifiers,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether both sides have a linked identifier.
    pub fn is_linked(&self) -> bool {
        self.data_identifiers.len() > 1
    }

    /// The native identifier linked for `entity`.
    pub fn data_identifier_for(&self, entity: &str) -> Result<&Value> {
        self.data_identifiers
            .iter()
            .find(|di| di.entity == entity)
            .map(|di| &di.id)
            .ok_or_else(|| Error::missing_data_identifier(self.id.as_str(), entity))
    }

    /// Whether `entity` owns an identifier equal to the one hashed as `id_hash`.
    pub fn has_identifier(&self, entity: &str, id_hash: &str) -> bool {
        self.data_identifiers
            .iter()
            .any(|di| di.matches(entity, id_hash))
    }

    /// Whether the state pairs all of `entities`.
    pub fn pairs_entities(&self, entities: &[String]) -> bool {
        entities.iter().all(|e| self.entities.contains(e))
    }

    /// Link an identifier, replacing any existing one for the same entity.
    pub fn link(&mut self, identifier: DataIdentifier) {
        match self
            .data_identifiers
            .iter_mut()
            .find(|di| di.entity == identifier.entity)
        {
            Some(existing) => *existing = identifier,
            None => self.data_identifiers.push(identifier),
        }
        self.touch();
    }

    /// Replace the stored content hash.
    pub fn set_hash(&mut self, hash: impl Into<String>) {
        self.hash = hash.into();
        self.touch();
    }

    /// Overwrite everything but identity and creation time from a draft.
    pub fn apply_draft(&mut self, draft: SyncStateDraft) {
        self.name = draft.name;
        self.entities = draft.entities;
        self.hash = draft.hash;
        self.data_identifiers = draft.data_identifiers;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Contents for creating or replacing a sync state.
///
/// The first identifier and the first entity form the upsert key: an
/// existing state with the same name that pairs the same entities and holds
/// that identifier for that entity is overwritten instead of duplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStateDraft {
    pub name: String,
    pub entities: Vec<String>,
    pub hash: String,
    pub data_identifiers: Vec<DataIdentifier>,
}

impl SyncStateDraft {
    /// The `(entity, identifier hash)` the upsert is keyed on.
    pub fn key(&self) -> Result<(&str, &str)> {
        let entity = self
            .entities
            .first()
            .ok_or_else(|| Error::StateStorage("sync state draft has no entities".to_string()))?;
        let identifier = self.data_identifiers.first().ok_or_else(|| {
            Error::StateStorage("sync state draft has no data identifiers".to_string())
        })?;
        Ok((entity.as_str(), identifier.hash.as_str()))
    }

    /// Whether an existing state is the one this draft should replace.
    pub fn targets(&self, state: &SyncState) -> Result<bool> {
        let (entity, id_hash) = self.key()?;
        Ok(state.name == self.name
            && state.has_identifier(entity, id_hash)
            && state.pairs_entities(&self.entities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn draft() -> SyncStateDraft {
        SyncStateDraft {
            name: "Contact".to_string(),
            entities: vec!["primary".to_string(), "secondary".to_string()],
            hash: "h1".to_string(),
            data_identifiers: vec![DataIdentifier::new("primary", json!(1))],
        }
    }

    #[test]
    fn test_link_grows_then_replaces() {
        let mut state = SyncState::from_draft(draft());
        assert!(!state.is_linked());

        state.link(DataIdentifier::new("secondary", json!("a")));
        assert!(state.is_linked());
        assert_eq!(state.data_identifier_for("secondary").unwrap(), &json!("a"));

        state.link(DataIdentifier::new("secondary", json!("b")));
        assert_eq!(state.data_identifiers.len(), 2);
        assert_eq!(state.data_identifier_for("secondary").unwrap(), &json!("b"));
    }

    #[test]
    fn test_missing_identifier_for_entity() {
        let state = SyncState::from_draft(draft());
        let err = state.data_identifier_for("secondary").unwrap_err();
        assert!(matches!(err, Error::MissingDataIdentifier { .. }));
    }

    #[test]
    fn test_draft_targets() {
        let state = SyncState::from_draft(draft());
        assert!(draft().targets(&state).unwrap());

        let mut other_entity = draft();
        other_entity.entities = vec!["primary".to_string(), "elsewhere".to_string()];
        assert!(!other_entity.targets(&state).unwrap());

        let mut other_id = draft();
        other_id.data_identifiers = vec![DataIdentifier::new("primary", json!(2))];
        assert!(!other_id.targets(&state).unwrap());
    }

    #[test]
    fn test_empty_draft_has_no_key() {
        let mut empty = draft();
        empty.data_identifiers.clear();
        assert!(empty.key().is_err());
    }

    #[test]
    fn test_identifier_hash_is_canonical() {
        let a = DataIdentifier::new("e", json!({"companyId": 12, "saleId": 524}));
        let b = DataIdentifier::new("e", json!({"saleId": 524, "companyId": 12}));
        assert_eq!(a.hash, b.hash);
    }
}
