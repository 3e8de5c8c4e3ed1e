use std::fmt;

use serde_json::{Map, Value};

use crate::{Func, Pattern, Routine};

/// Field marking a JSON object as an effect descriptor.
pub const EFFECT_MARKER: &str = "@@effect";

const PUT: &str = "PUT";
const TAKE: &str = "TAKE";
const CALL: &str = "CALL";
const FORK: &str = "FORK";
const RACE: &str = "RACE";

/// A description of something a task wants done.
///
/// Tasks never act directly: they hand an `Effect` to their runner and
/// suspend until the runner reports back. Leaf effects describe a single
/// action; [`All`](Effect::All) and [`Race`](Effect::Race) compose other
/// effects and nest to any depth.
///
/// # Example
///
/// ```rust
/// use effect_mock::{Effect, EffectKind, Func};
/// use serde_json::json;
///
/// let load = Func::declare("load_profile");
/// let effect = Effect::race([
///     ("profile", Effect::call(&load, vec![json!(7)])),
///     ("cancel", Effect::take("CANCEL")),
/// ]);
/// assert_eq!(effect.kind(), EffectKind::Race);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Dispatch a message.
    Put(Value),
    /// Wait for a message matching the pattern.
    Take(Pattern),
    /// Invoke a function with arguments.
    Call { func: Func, args: Vec<Value> },
    /// Spawn a nested task running `routine`.
    Fork { routine: Routine, args: Vec<Value> },
    /// Run every effect concurrently; resolves with all results in order.
    All(Vec<Effect>),
    /// Run every effect concurrently; resolves with the first to settle.
    Race(Vec<(String, Effect)>),
    /// Any other value, passed through untouched.
    Opaque(Value),
}

/// The shape of an effect, as determined by [`Effect::kind`] or [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectKind {
    Put,
    Take,
    Call,
    Fork,
    All,
    Race,
    Opaque,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectKind::Put => write!(f, "put"),
            EffectKind::Take => write!(f, "take"),
            EffectKind::Call => write!(f, "call"),
            EffectKind::Fork => write!(f, "fork"),
            EffectKind::All => write!(f, "all"),
            EffectKind::Race => write!(f, "race"),
            EffectKind::Opaque => write!(f, "opaque"),
        }
    }
}

impl Effect {
    pub fn put(message: Value) -> Self {
        Effect::Put(message)
    }

    pub fn take(pattern: impl Into<Pattern>) -> Self {
        Effect::Take(pattern.into())
    }

    pub fn call(func: &Func, args: Vec<Value>) -> Self {
        Effect::Call {
            func: func.clone(),
            args,
        }
    }

    pub fn fork(routine: &Routine, args: Vec<Value>) -> Self {
        Effect::Fork {
            routine: routine.clone(),
            args,
        }
    }

    pub fn all(effects: impl IntoIterator<Item = Effect>) -> Self {
        Effect::All(effects.into_iter().collect())
    }

    pub fn race<K: Into<String>>(entries: impl IntoIterator<Item = (K, Effect)>) -> Self {
        Effect::Race(entries.into_iter().map(|(k, e)| (k.into(), e)).collect())
    }

    /// Classify this effect.
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Put(_) => EffectKind::Put,
            Effect::Take(_) => EffectKind::Take,
            Effect::Call { .. } => EffectKind::Call,
            Effect::Fork { .. } => EffectKind::Fork,
            Effect::All(_) => EffectKind::All,
            Effect::Race(_) => EffectKind::Race,
            Effect::Opaque(_) => EffectKind::Opaque,
        }
    }

    /// Build an effect from its wire form.
    ///
    /// Follows the same rules as [`classify`]; anything unrecognized becomes
    /// [`Effect::Opaque`]. Wire-form calls reference functions by name, so
    /// they produce [`Func::declare`]d references.
    pub fn from_value(value: Value) -> Self {
        match classify(&value) {
            EffectKind::All => match value {
                Value::Array(items) => Effect::All(items.into_iter().map(Effect::from_value).collect()),
                other => Effect::Opaque(other),
            },
            EffectKind::Race => match payload(&value, RACE) {
                Some(Value::Object(entries)) => Effect::Race(
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), Effect::from_value(v.clone())))
                        .collect(),
                ),
                _ => Effect::Opaque(value),
            },
            EffectKind::Put => match payload(&value, PUT) {
                Some(message) => Effect::Put(message.clone()),
                None => Effect::Opaque(value),
            },
            EffectKind::Take => match payload(&value, TAKE).and_then(Pattern::from_value) {
                Some(pattern) => Effect::Take(pattern),
                None => Effect::Opaque(value),
            },
            EffectKind::Call => match payload(&value, CALL).and_then(parse_call) {
                Some((name, args)) => Effect::Call {
                    func: Func::declare(name),
                    args,
                },
                None => Effect::Opaque(value),
            },
            EffectKind::Fork | EffectKind::Opaque => Effect::Opaque(value),
        }
    }

    /// Render the wire form of this effect.
    ///
    /// Functions and routines are rendered by name, so the result is a
    /// description rather than something that can be executed.
    pub fn to_value(&self) -> Value {
        match self {
            Effect::Put(message) => marked(PUT, message.clone()),
            Effect::Take(pattern) => marked(TAKE, pattern.to_value()),
            Effect::Call { func, args } => marked(
                CALL,
                serde_json::json!({"fn": func.name(), "args": args}),
            ),
            Effect::Fork { routine, args } => marked(
                FORK,
                serde_json::json!({"fn": routine.name(), "args": args}),
            ),
            Effect::All(effects) => Value::Array(effects.iter().map(Effect::to_value).collect()),
            Effect::Race(entries) => {
                let map: Map<String, Value> = entries
                    .iter()
                    .map(|(k, e)| (k.clone(), e.to_value()))
                    .collect();
                marked(RACE, Value::Object(map))
            }
            Effect::Opaque(value) => value.clone(),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Put(message) => write!(f, "put({message})"),
            Effect::Take(pattern) => write!(f, "take({})", pattern.to_value()),
            Effect::Call { func, args } => write!(f, "call({func}, {})", Value::from(args.clone())),
            Effect::Fork { routine, args } => {
                write!(f, "fork({}, {})", routine.name(), Value::from(args.clone()))
            }
            Effect::All(effects) => write!(f, "all[{}]", effects.len()),
            Effect::Race(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                write!(f, "race{{{}}}", keys.join(", "))
            }
            Effect::Opaque(value) => write!(f, "{value}"),
        }
    }
}

impl From<Value> for Effect {
    fn from(value: Value) -> Self {
        Effect::from_value(value)
    }
}

/// Classify a raw wire value.
///
/// - An array is a parallel composite ([`EffectKind::All`]).
/// - An object carrying the [`EFFECT_MARKER`] and exactly one payload field
///   is the matching leaf kind, or [`EffectKind::Race`] when that field is
///   `RACE` and holds an object. `FORK` payloads name no runnable routine,
///   so they stay opaque.
/// - Everything else is [`EffectKind::Opaque`].
///
/// ```rust
/// use effect_mock::{classify, EffectKind};
/// use serde_json::json;
///
/// assert_eq!(classify(&json!({"@@effect": true, "PUT": {"type": "X"}})), EffectKind::Put);
/// assert_eq!(classify(&json!([1, 2])), EffectKind::All);
/// assert_eq!(classify(&json!({"type": "X"})), EffectKind::Opaque);
/// ```
pub fn classify(value: &Value) -> EffectKind {
    let object = match value {
        Value::Array(_) => return EffectKind::All,
        Value::Object(object) => object,
        _ => return EffectKind::Opaque,
    };
    if object.get(EFFECT_MARKER) != Some(&Value::Bool(true)) {
        return EffectKind::Opaque;
    }

    let mut kinds = [PUT, TAKE, CALL, FORK, RACE]
        .into_iter()
        .filter(|field| object.contains_key(*field));
    let (Some(field), None) = (kinds.next(), kinds.next()) else {
        return EffectKind::Opaque;
    };

    match field {
        PUT => EffectKind::Put,
        TAKE => EffectKind::Take,
        CALL => EffectKind::Call,
        // A spawn cannot carry its routine on the wire.
        FORK => EffectKind::Opaque,
        RACE if object.get(RACE).is_some_and(Value::is_object) => EffectKind::Race,
        _ => EffectKind::Opaque,
    }
}

fn marked(field: &str, payload: Value) -> Value {
    let mut object = Map::new();
    object.insert(EFFECT_MARKER.to_string(), Value::Bool(true));
    object.insert(field.to_string(), payload);
    Value::Object(object)
}

fn payload<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value.as_object().and_then(|o| o.get(field))
}

fn parse_call(payload: &Value) -> Option<(&str, Vec<Value>)> {
    let name = payload.get("fn")?.as_str()?;
    let args = match payload.get("args") {
        Some(Value::Array(args)) => args.clone(),
        None => Vec::new(),
        Some(_) => return None,
    };
    Some((name, args))
}
