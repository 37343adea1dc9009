//! # frigg-sync
//!
//! Bidirectional record synchronization between two connected systems.
//!
//! One system is the primary (authoritative), the other the secondary.
//! Records of a configured type are matched across both sides, merged field
//! by field, and kept paired through durable sync states so later passes
//! only push what actually changed.
//!
//! ## Core Components
//!
//! - **Record**: Comparable records, field mapping and match signatures
//! - **State**: Durable pairings and their stores
//! - **Sync**: The `SyncManager` with its initial and incremental passes
//! - **Hashing**: Canonical JSON and content hashes
//!
//! ## Example
//!
//! ```rust,ignore
//! use frigg_sync::{Integration, RecordConfig, SqliteSyncStateStore, SyncManager};
//!
//! let config = Arc::new(RecordConfig::load(Path::new("company.json"))?);
//! let store = Arc::new(SqliteSyncStateStore::open("frigg-sync.db")?);
//! let manager = SyncManager::new(config, Integration::new(crm, sales), store);
//!
//! let report = manager.initial_sync().await?;
//! println!("Paired {} records", report.matched);
//! ```

pub mod error;
pub mod hashing;
pub mod record;
pub mod state;
pub mod sync;

// Re-exports for convenience
pub use error::{Error, Result};
pub use hashing::{hash_json, hash_values, to_canonical_json};
pub use record::{FieldMap, FieldMapper, HashOptions, RecordConfig, SyncRecord};
pub use state::{
    DataIdentifier, InMemorySyncStateStore, SqliteSyncStateStore, SyncState, SyncStateDraft,
    SyncStateId, SyncStateStore,
};
pub use sync::{
    InitialSyncReport, Integration, ModuleCollaborator, SyncManager, SyncManagerConfig,
    SyncOutcome,
};
