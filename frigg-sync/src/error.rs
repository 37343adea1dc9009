//! Error types for frigg-sync.

use thiserror::Error;

/// Result type alias using frigg-sync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during synchronization.
#[derive(Error, Debug)]
pub enum Error {
    /// More than one sync state matched a `(name, data identifier, entity)` triple.
    ///
    /// This indicates corrupted pairing data and is never resolved automatically.
    #[error("Found {count} sync states for {name} with entity {entity}; expected at most one")]
    AmbiguousSyncState {
        name: String,
        entity: String,
        count: usize,
    },

    /// A sync state has no data identifier for the requested entity.
    #[error("Sync state {sync_id} has no data identifier for entity {entity}")]
    MissingDataIdentifier { sync_id: String, entity: String },

    /// A record was confirmed before it was attached to a sync state.
    #[error("Record {name} has no sync id")]
    MissingSyncId { name: String },

    /// Sync state lookup by id failed.
    #[error("Sync state not found: {0}")]
    SyncStateNotFound(String),

    /// A collaborator (external system adapter) failed.
    #[error("Collaborator error: {module} - {message}")]
    Collaborator {
        module: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Sync state storage error
    #[error("Sync state storage error: {0}")]
    StateStorage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an ambiguous sync state error.
    pub fn ambiguous_sync_state(
        name: impl Into<String>,
        entity: impl Into<String>,
        count: usize,
    ) -> Self {
        Self::AmbiguousSyncState {
            name: name.into(),
            entity: entity.into(),
            count,
        }
    }

    /// Create a missing data identifier error.
    pub fn missing_data_identifier(sync_id: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::MissingDataIdentifier {
            sync_id: sync_id.into(),
            entity: entity.into(),
        }
    }

    /// Create a collaborator error.
    pub fn collaborator(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            module: module.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a collaborator error with source.
    pub fn collaborator_with_source(
        module: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Collaborator {
            module: module.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error signals corrupted pairing data rather than a transient failure.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousSyncState { .. } | Self::MissingDataIdentifier { .. }
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::StateStorage(err.to_string())
    }
}
