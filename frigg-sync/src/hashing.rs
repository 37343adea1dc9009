//! Canonical JSON hashing.
//!
//! Every hash the engine persists or compares (match signatures, content
//! hashes, identifier hashes) is a SHA-256 digest over a canonical JSON
//! rendering: object keys sorted, no whitespace, and integral floats written
//! as integers so `5` and `5.0` hash identically. Array order is preserved.

use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

/// Largest integer a double represents exactly (2^53).
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Render a value as canonical JSON text.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Hash an arbitrary JSON value.
pub fn hash_json(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Hash an ordered list of values as a JSON array.
pub fn hash_values<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut out = String::from("[");
    for (idx, value) in values.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        write_canonical(value, &mut out);
    }
    out.push(']');
    hash_str(&out)
}

fn hash_str(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn write_number(n: &Number, out: &mut String) {
    if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
        if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT {
            out.push_str(&(f as i64).to_string());
            return;
        }
    }
    out.push_str(&n.to_string());
}

fn write_string(s: &str, out: &mut String) {
    // Serializing a str cannot fail.
    out.push_str(&serde_json::to_string(s).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_object_keys_sorted() {
        let value = json!({"saleId": 524, "companyId": 12});
        assert_eq!(to_canonical_json(&value), r#"{"companyId":12,"saleId":524}"#);
    }

    #[test]
    fn test_key_order_does_not_change_hash() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": {"y": 2, "x": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"x": 3, "y": 2}, "a": 1}"#).unwrap();
        assert_eq!(hash_json(&a), hash_json(&b));
    }

    #[test]
    fn test_integral_float_matches_integer() {
        assert_eq!(hash_json(&json!(5.0)), hash_json(&json!(5)));
        assert_eq!(to_canonical_json(&json!(1.5)), "1.5");
    }

    #[test]
    fn test_array_order_matters() {
        let forward = [json!("a"), json!("b")];
        let backward = [json!("b"), json!("a")];
        assert_ne!(hash_values(forward.iter()), hash_values(backward.iter()));
    }

    #[test]
    fn test_hash_values_matches_hash_json_of_array() {
        let values = [json!("Acme"), Value::Null, json!(3)];
        assert_eq!(
            hash_values(values.iter()),
            hash_json(&Value::Array(values.to_vec()))
        );
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_json(&json!({"id": 1}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
