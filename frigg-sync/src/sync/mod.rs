//! Bidirectional reconciliation between a primary and a secondary system.
//!
//! ## Overview
//!
//! A [`SyncManager`] keeps one record type consistent between two
//! [`ModuleCollaborator`]s. The primary side is authoritative: its non-blank
//! values always win, and its blank values are filled from the secondary.
//!
//! ## Components
//!
//! - [`types`]: Options, outcomes and the initial sync report
//! - [`conflict`]: Field-level conflict resolution
//! - [`plan`]: Filtering, de-duplication and partitioning of record sets
//! - [`collaborator`]: The contract an external system adapter fulfils
//! - [`engine`]: The `SyncManager` orchestrator
//!
//! ## Passes
//!
//! - **Initial sync** fetches everything from both sides, pairs records by
//!   their match signature, merges each pair, and creates whatever is
//!   missing on either side.
//! - **Incremental sync** takes changed primary records, looks up their
//!   pairing, and sends only updates and creates whose content hash moved.
//!
//! ## Example
//!
//! ```rust,ignore
//! use frigg_sync::sync::{Integration, SyncManager, SyncManagerConfig};
//! use frigg_sync::state::SqliteSyncStateStore;
//!
//! let store = Arc::new(SqliteSyncStateStore::open("frigg-sync.db")?);
//! let manager = SyncManager::new(record_config, Integration::new(crm, sales), store)
//!     .with_config(SyncManagerConfig::default().with_unidirectional(true));
//!
//! let report = manager.initial_sync().await?;
//! println!("Matched {} records", report.matched);
//!
//! let outcomes = manager.sync(changed_records).await?;
//! ```

pub mod collaborator;
pub mod conflict;
pub mod engine;
pub mod plan;
mod proptest;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use collaborator::{Integration, ModuleCollaborator};
pub use conflict::{merge_records, resolve_conflict, ConflictResolution, MergeOutcome};
pub use engine::SyncManager;
pub use plan::{
    dedupe_by_match_hash, drop_missing_match_data, keep_last_per_identifier, partition, Partition,
};
pub use types::{InitialSyncReport, SyncManagerConfig, SyncOutcome};
