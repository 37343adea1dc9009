//! Durable pairing state between two connected systems.
//!
//! A [`SyncState`] links one logical entity's identifiers across the
//! primary and secondary systems, and remembers the last content hash that
//! was pushed so unchanged records are skipped on the next pass.
//!
//! ## Lifecycle
//!
//! - Created on first encounter of a record with no pairing, holding only
//!   the source side's identifier.
//! - Linked once the other side confirms a create; it then holds one
//!   identifier per entity.
//! - Its hash is refreshed on every confirmed update.
//! - Never deleted by the engine.
//!
//! ## Stores
//!
//! - [`InMemorySyncStateStore`]: process-local, for tests and short-lived jobs
//! - [`SqliteSyncStateStore`]: persistent, one transaction per write

mod schema;
mod sqlite;
mod store;
mod types;

pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use sqlite::SqliteSyncStateStore;
pub use store::{InMemorySyncStateStore, SyncStateStore};
pub use types::{DataIdentifier, SyncState, SyncStateDraft, SyncStateId};
