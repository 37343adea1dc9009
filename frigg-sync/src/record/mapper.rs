//! Field mapping from module-native payloads to record data.
//!
//! Each connected module owns one [`FieldMapper`]. The collaborator for that
//! module holds its mapper and passes it to [`SyncRecord::from_payload`]
//! when building records, so no global module-name lookup is involved.
//!
//! [`SyncRecord::from_payload`]: super::SyncRecord::from_payload

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use super::types::SyncRecord;

/// Maps a module's raw payload onto the configured record keys.
pub trait FieldMapper: Send + Sync {
    /// Name of the module this mapper belongs to.
    fn module_name(&self) -> &str;

    /// Extract the value for `key` from a raw payload.
    fn map_field(&self, key: &str, payload: &Value) -> Value;

    /// Convert a record back into the module's native shape.
    fn reverse(&self, record: &SyncRecord) -> Value {
        Value::Object(record.data.clone())
    }
}

type Extractor = Box<dyn Fn(&Value) -> Value + Send + Sync>;
type Injector = Box<dyn Fn(&mut Map<String, Value>, &Value) + Send + Sync>;

/// A [`FieldMapper`] assembled from per-key extraction functions.
///
/// ```rust,ignore
/// let mapper = FieldMap::new("hubspot")
///     .pointer("email", "/properties/email")
///     .field("name", |p| json!(format!("{} {}", p["first"], p["last"])));
/// ```
pub struct FieldMap {
    module_name: String,
    extractors: HashMap<String, Extractor>,
    injectors: Vec<(String, Injector)>,
}

impl FieldMap {
    /// Create an empty map for a module.
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            extractors: HashMap::new(),
            injectors: Vec::new(),
        }
    }

    /// Map `key` with an arbitrary function of the payload.
    ///
    /// This mapping is one-way. Once the map has any reverse mapping (from
    /// [`pointer`](Self::pointer), [`direct`](Self::direct) or
    /// [`field_with_reverse`](Self::field_with_reverse)), `key` is left out
    /// of reversed payloads. A map with no reverse mappings at all reverses
    /// to the record's data object.
    pub fn field<F>(mut self, key: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let key = key.into();
        self.injectors.retain(|(k, _)| k != &key);
        self.extractors.insert(key, Box::new(extract));
        self
    }

    /// Map `key` with an arbitrary function of the payload, and write it
    /// back with `inject` when reversing.
    pub fn field_with_reverse<F, G>(mut self, key: impl Into<String>, extract: F, inject: G) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
        G: Fn(&mut Map<String, Value>, &Value) + Send + Sync + 'static,
    {
        let key = key.into();
        self.extractors.insert(key.clone(), Box::new(extract));
        self.injectors.retain(|(k, _)| k != &key);
        self.injectors.push((key, Box::new(inject)));
        self
    }

    /// Map `key` to the value at a JSON pointer, in both directions.
    ///
    /// Missing values map to `null`. The reverse direction writes the
    /// record value back under the same pointer, creating objects as needed.
    pub fn pointer(mut self, key: impl Into<String>, pointer: impl Into<String>) -> Self {
        let key = key.into();
        let pointer = pointer.into();

        let read = pointer.clone();
        self.extractors.insert(
            key.clone(),
            Box::new(move |payload: &Value| payload.pointer(&read).cloned().unwrap_or(Value::Null)),
        );
        self.injectors.retain(|(k, _)| k != &key);
        self.injectors.push((
            key,
            Box::new(move |target: &mut Map<String, Value>, value: &Value| {
                write_pointer(target, &pointer, value.clone());
            }),
        ));
        self
    }

    /// Map `key` to the top-level payload property of the same name.
    pub fn direct(self, key: impl Into<String>) -> Self {
        let key = key.into();
        let pointer = format!("/{}", escape_pointer_token(&key));
        self.pointer(key, pointer)
    }

    /// Whether a mapping exists for `key`.
    pub fn maps(&self, key: &str) -> bool {
        self.extractors.contains_key(key)
    }
}

impl fmt::Debug for FieldMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.extractors.keys().collect();
        keys.sort();
        f.debug_struct("FieldMap")
            .field("module_name", &self.module_name)
            .field("keys", &keys)
            .finish()
    }
}

impl FieldMapper for FieldMap {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn map_field(&self, key: &str, payload: &Value) -> Value {
        match self.extractors.get(key) {
            Some(extract) => extract(payload),
            None => {
                tracing::warn!(module = %self.module_name, key, "No field mapping for key");
                Value::Null
            }
        }
    }

    fn reverse(&self, record: &SyncRecord) -> Value {
        if self.injectors.is_empty() {
            return Value::Object(record.data.clone());
        }

        let mut target = Map::new();
        for (key, inject) in &self.injectors {
            inject(&mut target, record.get(key));
        }
        Value::Object(target)
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn write_pointer(target: &mut Map<String, Value>, pointer: &str, value: Value) {
    let tokens: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(unescape_pointer_token)
        .collect();
    let Some((last, parents)) = tokens.split_last() else {
        return;
    };

    let mut current = target;
    for token in parents {
        let entry = current
            .entry(token.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.clone(), value);
}
