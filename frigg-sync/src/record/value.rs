//! Value predicates shared by matching and conflict resolution.
//!
//! External systems hand us loosely typed JSON, so equality here follows the
//! loose rules integrations expect: `null`, `false`, `0` and `""` are all
//! "falsy", and numbers compare by numeric value regardless of their
//! integer/float representation.

use serde_json::Value;

/// Whether a value is falsy (`null`, `false`, zero, or the empty string).
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Whether a value is weak enough to be overwritten by the other side.
pub fn is_replaceable(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Structural equality with numbers compared by value.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).map_or(false, |y| deep_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Strict equality: values of different JSON types are never equal.
pub fn strict_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => false,
        _ => a == b,
    }
}

fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    match (x.as_i64(), y.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => match (x.as_u64(), y.as_u64()) {
            (Some(a), Some(b)) => a == b,
            _ => x.as_f64() == y.as_f64(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values() {
        for value in [Value::Null, json!(false), json!(0), json!(0.0), json!("")] {
            assert!(is_falsy(&value), "{value} should be falsy");
        }
        for value in [json!(true), json!(1), json!("0"), json!([]), json!({})] {
            assert!(!is_falsy(&value), "{value} should be truthy");
        }
    }

    #[test]
    fn test_replaceable_is_null_or_empty_string() {
        assert!(is_replaceable(&Value::Null));
        assert!(is_replaceable(&json!("")));
        assert!(!is_replaceable(&json!(0)));
        assert!(!is_replaceable(&json!(false)));
        assert!(!is_replaceable(&json!(" ")));
    }

    #[test]
    fn test_deep_equal_numbers_by_value() {
        assert!(deep_equal(&json!(5), &json!(5.0)));
        assert!(deep_equal(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!deep_equal(&json!(5), &json!("5")));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_strict_equal_identity_for_containers() {
        assert!(strict_equal(&json!(7), &json!(7.0)));
        assert!(!strict_equal(&json!(7), &json!("7")));
        assert!(!strict_equal(&json!([1]), &json!([1])));
    }
}
