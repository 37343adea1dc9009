//! Comparable records pulled from external systems.
//!
//! A [`SyncRecord`] is one external record reduced to what the sync engine
//! needs: its native identifier, its mapped field data, a match signature
//! and a content hash. Records are configured per logical type through a
//! [`RecordConfig`] and built from raw payloads through a module's
//! [`FieldMapper`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use frigg_sync::record::{FieldMap, RecordConfig, SyncRecord};
//!
//! let config = Arc::new(
//!     RecordConfig::new("Contact")
//!         .with_keys(["email", "name"])
//!         .with_match_on(["email"]),
//! );
//! let mapper = FieldMap::new("hubspot")
//!     .pointer("email", "/properties/email")
//!     .pointer("name", "/properties/name");
//!
//! let record = SyncRecord::from_payload(config, &mapper, json!(51), &payload);
//! ```

mod mapper;
mod types;
pub mod value;

pub use mapper::{FieldMap, FieldMapper};
pub use types::{HashOptions, RecordConfig, SyncRecord};
