//! Partial deep matching of JSON values.

use serde_json::Value;

/// Returns true if `actual` contains everything `expected` describes.
///
/// - Objects match when every field of `expected` is present in `actual`
///   and matches recursively. Extra fields in `actual` are ignored.
/// - Arrays match positionally as a prefix: `actual` may be longer.
/// - Any other value must be equal.
///
/// ```rust
/// use effect_mock::is_match;
/// use serde_json::json;
///
/// let order = json!({"type": "ORDER", "payload": {"id": 7, "items": [1, 2, 3]}});
/// assert!(is_match(&order, &json!({"type": "ORDER"})));
/// assert!(is_match(&order, &json!({"payload": {"items": [1, 2]}})));
/// assert!(!is_match(&order, &json!({"payload": {"id": 8}})));
/// ```
pub fn is_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| is_match(a, value))),
        (Value::Array(actual), Value::Array(expected)) => args_match(actual, expected),
        _ => actual == expected,
    }
}

/// Positional prefix match of argument lists, each position compared with [`is_match`].
pub(crate) fn args_match(actual: &[Value], expected: &[Value]) -> bool {
    actual.len() >= expected.len()
        && actual
            .iter()
            .zip(expected.iter())
            .all(|(a, e)| is_match(a, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_require_equality() {
        assert!(is_match(&json!(1), &json!(1)));
        assert!(!is_match(&json!(1), &json!(2)));
        assert!(!is_match(&json!("1"), &json!(1)));
        assert!(is_match(&Value::Null, &Value::Null));
    }

    #[test]
    fn objects_match_subset_of_fields() {
        let actual = json!({"type": "X", "payload": {"a": 1, "b": 2}});
        assert!(is_match(&actual, &json!({})));
        assert!(is_match(&actual, &json!({"payload": {"b": 2}})));
        assert!(!is_match(&actual, &json!({"missing": true})));
        assert!(!is_match(&json!([1]), &json!({})));
    }

    #[test]
    fn arrays_match_as_prefix() {
        let actual = json!([1, {"id": 2, "name": "n"}, 3]);
        assert!(is_match(&actual, &json!([])));
        assert!(is_match(&actual, &json!([1, {"id": 2}])));
        assert!(!is_match(&actual, &json!([{"id": 2}])));
        assert!(!is_match(&json!([1]), &json!([1, 2])));
    }

    #[test]
    fn args_match_is_positional() {
        let args = [json!("user-1"), json!({"verbose": true, "depth": 2})];
        assert!(args_match(&args, &[json!("user-1")]));
        assert!(args_match(&args, &[json!("user-1"), json!({"depth": 2})]));
        assert!(!args_match(&args, &[json!({"depth": 2})]));
    }
}
