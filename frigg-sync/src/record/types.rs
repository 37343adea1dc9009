//! Record types: the per-record-type configuration and the comparable record.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::hashing::{hash_json, hash_values};
use crate::state::SyncStateId;

use super::mapper::FieldMapper;
use super::value::{is_falsy, is_replaceable};

static NULL: Value = Value::Null;

/// Configuration for one logical record type (e.g. "Contact" or "Deal").
///
/// `keys` fixes the order used for content hashing; `match_on` is the
/// ordered subset of keys whose values decide whether two records from
/// different systems describe the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Logical record-type name, stored on every sync state.
    pub name: String,
    /// Ordered data keys.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Ordered match keys.
    #[serde(default)]
    pub match_on: Vec<String>,
}

impl RecordConfig {
    /// Create a configuration with no keys.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            match_on: Vec::new(),
        }
    }

    /// Set the ordered data keys.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the ordered match keys.
    pub fn with_match_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_on = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration for obvious mistakes.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("record name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for key in &self.keys {
            if !seen.insert(key.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate key '{}' in record config {}",
                    key, self.name
                )));
            }
        }

        Ok(())
    }

    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

/// Options for content hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashOptions {
    /// Hash empty strings as `null`, so "" and "not yet set" are equivalent.
    pub omit_empty_strings_from_data: bool,
}

impl HashOptions {
    /// Options with empty-string omission set as given.
    pub fn omitting_empty_strings(omit: bool) -> Self {
        Self {
            omit_empty_strings_from_data: omit,
        }
    }
}

/// One external record as a comparable, hashable unit.
///
/// Records are built fresh on every reconciliation pass and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    config: Arc<RecordConfig>,
    /// Module (external system) the record came from.
    pub module_name: String,
    /// The external system's native identifier.
    pub data_identifier: Value,
    /// Hash of `data_identifier`.
    pub data_identifier_hash: String,
    /// Field values keyed by configured key.
    pub data: Map<String, Value>,
    /// True if any match key is falsy or absent.
    pub missing_match_data: bool,
    /// Hash over the match key values, in configured order.
    pub match_hash: String,
    /// Pairing this record belongs to, once known.
    pub sync_id: Option<SyncStateId>,
}

impl SyncRecord {
    /// Build a record by running every configured key through a field mapper.
    pub fn from_payload(
        config: Arc<RecordConfig>,
        mapper: &dyn FieldMapper,
        data_identifier: Value,
        payload: &Value,
    ) -> Self {
        let data = config
            .keys
            .iter()
            .map(|key| (key.clone(), mapper.map_field(key, payload)))
            .collect();
        Self::from_data(config, mapper.module_name(), data_identifier, data)
    }

    /// Build a record from already-mapped data.
    pub fn from_data(
        config: Arc<RecordConfig>,
        module_name: impl Into<String>,
        data_identifier: Value,
        data: Map<String, Value>,
    ) -> Self {
        let missing_match_data = config
            .match_on
            .iter()
            .any(|key| data.get(key).map_or(true, is_falsy));
        let match_hash = hash_values(config.match_on.iter().map(|key| field(&data, key)));
        let data_identifier_hash = hash_json(&data_identifier);

        Self {
            config,
            module_name: module_name.into(),
            data_identifier,
            data_identifier_hash,
            data,
            missing_match_data,
            match_hash,
            sync_id: None,
        }
    }

    /// The logical record-type name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The record's configuration.
    pub fn config(&self) -> &Arc<RecordConfig> {
        &self.config
    }

    /// Whether two records describe the same entity.
    pub fn equals(&self, other: &SyncRecord) -> bool {
        self.match_hash == other.match_hash
    }

    /// Read a field; absent keys read as `null`.
    pub fn get(&self, key: &str) -> &Value {
        field(&self.data, key)
    }

    /// Overwrite a field.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Whether the value under `key` may be overwritten by the other side.
    pub fn data_key_is_replaceable(&self, key: &str) -> bool {
        is_replaceable(self.get(key))
    }

    /// Content hash over the configured key order.
    ///
    /// The data map's own ordering is irrelevant.
    pub fn hash_data(&self, options: HashOptions) -> String {
        let ordered: Vec<&Value> = self
            .config
            .keys
            .iter()
            .map(|key| {
                let value = field(&self.data, key);
                if options.omit_empty_strings_from_data && value.as_str() == Some("") {
                    &NULL
                } else {
                    value
                }
            })
            .collect();
        hash_values(ordered)
    }

    /// Attach the record to a sync state.
    pub fn set_sync_id(&mut self, sync_id: SyncStateId) {
        self.sync_id = Some(sync_id);
    }

    /// Convert back into the module's native payload.
    pub fn to_payload(&self, mapper: &dyn FieldMapper) -> Value {
        mapper.reverse(self)
    }
}

fn field<'a>(data: &'a Map<String, Value>, key: &str) -> &'a Value {
    data.get(key).unwrap_or(&NULL)
}
