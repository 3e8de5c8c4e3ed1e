use std::{fmt, sync::Arc};

use serde_json::Value;

type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Describes which messages a [`Take`](crate::Effect::Take) effect waits for.
///
/// Messages are JSON objects whose `"type"` field names them, e.g.
/// `{"type": "USER_REQUESTED", "id": 7}`.
///
/// | Pattern | Matches |
/// |---------|---------|
/// | `Pattern::Any` (or `"*"`) | every message |
/// | `Pattern::Type("X")` (or `"X"`) | messages whose `type` is `"X"` |
/// | `Pattern::OneOf(..)` | messages matched by any inner pattern |
/// | `Pattern::predicate(f)` | messages for which `f` returns true |
#[derive(Clone)]
pub enum Pattern {
    Any,
    Type(String),
    OneOf(Vec<Pattern>),
    Predicate(PredicateFn),
}

impl Pattern {
    /// A pattern backed by a custom predicate.
    ///
    /// Predicate patterns are equal only to clones of themselves.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Pattern::Predicate(Arc::new(f))
    }

    /// Returns true if the message satisfies this pattern.
    pub fn matches(&self, message: &Value) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Type(ty) => message.get("type").and_then(Value::as_str) == Some(ty.as_str()),
            Pattern::OneOf(patterns) => patterns.iter().any(|p| p.matches(message)),
            Pattern::Predicate(f) => f(message),
        }
    }

    /// Wire form: `"*"`, a type string, or an array of those.
    ///
    /// Predicates have no wire form and render as `null`.
    pub fn to_value(&self) -> Value {
        match self {
            Pattern::Any => Value::String("*".into()),
            Pattern::Type(ty) => Value::String(ty.clone()),
            Pattern::OneOf(patterns) => Value::Array(patterns.iter().map(Pattern::to_value).collect()),
            Pattern::Predicate(_) => Value::Null,
        }
    }

    /// Parse the wire form produced by [`to_value`](Self::to_value).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Pattern::from(s.as_str())),
            Value::Array(items) => items
                .iter()
                .map(Pattern::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Pattern::OneOf),
            _ => None,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pattern::Any, Pattern::Any) => true,
            (Pattern::Type(a), Pattern::Type(b)) => a == b,
            (Pattern::OneOf(a), Pattern::OneOf(b)) => a == b,
            (Pattern::Predicate(a), Pattern::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => write!(f, "Any"),
            Pattern::Type(ty) => write!(f, "Type({ty:?})"),
            Pattern::OneOf(patterns) => f.debug_tuple("OneOf").field(patterns).finish(),
            Pattern::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        if s == "*" {
            Pattern::Any
        } else {
            Pattern::Type(s.to_string())
        }
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::from(s.as_str())
    }
}

impl<P: Into<Pattern>> From<Vec<P>> for Pattern {
    fn from(patterns: Vec<P>) -> Self {
        Pattern::OneOf(patterns.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_pattern_matches_type_field() {
        let pattern = Pattern::from("LOGIN");
        assert!(pattern.matches(&json!({"type": "LOGIN", "user": "ada"})));
        assert!(!pattern.matches(&json!({"type": "LOGOUT"})));
        assert!(!pattern.matches(&json!("LOGIN")));
    }

    #[test]
    fn star_matches_everything() {
        assert_eq!(Pattern::from("*"), Pattern::Any);
        assert!(Pattern::Any.matches(&json!(42)));
    }

    #[test]
    fn one_of_matches_any_inner() {
        let pattern = Pattern::from(vec!["A", "B"]);
        assert!(pattern.matches(&json!({"type": "B"})));
        assert!(!pattern.matches(&json!({"type": "C"})));
    }

    #[test]
    fn predicates_compare_by_identity() {
        let p = Pattern::predicate(|m| m.get("urgent").is_some());
        let q = Pattern::predicate(|m| m.get("urgent").is_some());
        assert_eq!(p, p.clone());
        assert_ne!(p, q);
        assert!(p.matches(&json!({"urgent": true})));
    }

    #[test]
    fn wire_form_round_trips_for_declarative_patterns() {
        let pattern = Pattern::from(vec!["A", "*"]);
        assert_eq!(pattern.to_value(), json!(["A", "*"]));
        assert_eq!(Pattern::from_value(&pattern.to_value()), Some(pattern));
        assert_eq!(Pattern::from_value(&json!(3)), None);
    }
}
