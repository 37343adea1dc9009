//! Type definitions for the sync manager.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::HashOptions;
use crate::state::SyncState;

/// Reconciliation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncManagerConfig {
    /// Drop records with blank match data before matching.
    pub ignore_empty_match_values: bool,
    /// Treat the primary system as read-only.
    pub is_unidirectional_sync: bool,
    /// Keep only the first record of each match signature.
    pub use_first_matching_duplicate: bool,
    /// Hash empty strings as absent values.
    pub omit_empty_strings_from_data: bool,
}

impl Default for SyncManagerConfig {
    fn default() -> Self {
        Self {
            ignore_empty_match_values: true,
            is_unidirectional_sync: false,
            use_first_matching_duplicate: true,
            omit_empty_strings_from_data: true,
        }
    }
}

impl SyncManagerConfig {
    /// Set whether blank match data is ignored.
    pub fn with_ignore_empty_match_values(mut self, ignore: bool) -> Self {
        self.ignore_empty_match_values = ignore;
        self
    }

    /// Set unidirectional mode.
    pub fn with_unidirectional(mut self, unidirectional: bool) -> Self {
        self.is_unidirectional_sync = unidirectional;
        self
    }

    /// Set whether duplicates collapse to their first occurrence.
    pub fn with_first_matching_duplicate(mut self, use_first: bool) -> Self {
        self.use_first_matching_duplicate = use_first;
        self
    }

    /// Set whether empty strings hash as absent.
    pub fn with_omit_empty_strings(mut self, omit: bool) -> Self {
        self.omit_empty_strings_from_data = omit;
        self
    }

    /// Hash options derived from this configuration.
    pub fn hash_options(&self) -> HashOptions {
        HashOptions::omitting_empty_strings(self.omit_empty_strings_from_data)
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

/// Result of one record in an incremental sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The secondary collaborator's result for an update.
    Updated(Value),
    /// The secondary collaborator's result for a create.
    Created(Value),
    /// Content hash unchanged; nothing was sent.
    Unchanged(SyncState),
}

impl SyncOutcome {
    /// Whether nothing was sent for this record.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged(_))
    }
}

/// Summary of an initial sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialSyncReport {
    /// Records fetched from the primary.
    pub primary_fetched: usize,
    /// Records fetched from the secondary.
    pub secondary_fetched: usize,
    /// Primary records dropped for blank match data.
    pub primary_ignored: usize,
    /// Secondary records dropped for blank match data.
    pub secondary_ignored: usize,
    /// Primary records dropped as duplicates.
    pub primary_duplicates: usize,
    /// Secondary records dropped as duplicates.
    pub secondary_duplicates: usize,
    /// Matched pairs.
    pub matched: usize,
    /// Records sent to the primary as updates.
    pub primary_updated: usize,
    /// Records sent to the primary as creates.
    pub primary_created: usize,
    /// Records sent to the secondary as updates.
    pub secondary_updated: usize,
    /// Records sent to the secondary as creates.
    pub secondary_created: usize,
    /// Sync states written.
    pub states_written: usize,
    /// Wall time for the whole pass.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
