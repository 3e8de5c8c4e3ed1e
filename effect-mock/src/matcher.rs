//! Effect matching for listeners, stubs and queries.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{Effect, Func, Pattern, Routine, recursive::matches_recursive, value_match};

type PredicateFn = Arc<dyn Fn(&Effect) -> bool + Send + Sync>;

#[derive(Clone)]
enum Rule {
    Effect(Effect),
    PutAction(Value),
    TakeAction(Pattern),
    Call(Func),
    CallWithArgs(Func, Vec<Value>),
    CallWithExactArgs(Func, Vec<Value>),
    Fork(Routine),
    AnyFork,
    Any,
    Predicate(PredicateFn),
}

/// A matcher selecting effects for listeners, stubs and queries.
///
/// `EffectMatcher` can match effects by:
/// - Deep equality with a given effect
/// - Dispatched message (partial match)
/// - Wait pattern (equality)
/// - Invoked function, optionally with partial or exact arguments
/// - Forked routine
/// - Custom predicate
///
/// Matchers are compared structurally: two matchers built from the same
/// rule, function and arguments are equal, which is how the stub list
/// decides whether a new stub replaces an old one. Predicate matchers are
/// equal only to their own clones.
///
/// [`matches`](Self::matches) also looks inside `All` and `Race`
/// composites; [`matches_leaf`](Self::matches_leaf) checks only the
/// effect itself.
///
/// # Example
///
/// ```rust
/// use effect_mock::{Effect, EffectMatcher, Func};
/// use serde_json::json;
///
/// let save = Func::declare("save");
/// let effect = Effect::all([Effect::call(&save, vec![json!({"id": 1, "name": "x"})])]);
///
/// assert!(EffectMatcher::call(&save).matches(&effect));
/// assert!(EffectMatcher::call_with_args(&save, vec![json!({"id": 1})]).matches(&effect));
/// assert!(!EffectMatcher::call_with_exact_args(&save, vec![json!({"id": 1})]).matches(&effect));
/// assert!(!EffectMatcher::call(&save).matches_leaf(&effect));
/// ```
#[derive(Clone)]
pub struct EffectMatcher {
    rule: Rule,
}

impl EffectMatcher {
    fn new(rule: Rule) -> Self {
        Self { rule }
    }

    /// Match effects deep-equal to the given one.
    pub fn by_effect(effect: Effect) -> Self {
        Self::new(Rule::Effect(effect))
    }

    /// Match dispatches whose message contains the given fields.
    pub fn put_action(message: Value) -> Self {
        Self::new(Rule::PutAction(message))
    }

    /// Match waits on an equal pattern.
    pub fn take_action(pattern: impl Into<Pattern>) -> Self {
        Self::new(Rule::TakeAction(pattern.into()))
    }

    /// Match invocations of the function, whatever the arguments.
    pub fn call(func: &Func) -> Self {
        Self::new(Rule::Call(func.clone()))
    }

    /// Match invocations whose arguments start with the given ones,
    /// each compared with [`is_match`](crate::is_match).
    pub fn call_with_args(func: &Func, args: Vec<Value>) -> Self {
        Self::new(Rule::CallWithArgs(func.clone(), args))
    }

    /// Match invocations with exactly these arguments.
    pub fn call_with_exact_args(func: &Func, args: Vec<Value>) -> Self {
        Self::new(Rule::CallWithExactArgs(func.clone(), args))
    }

    /// Match spawns of the routine.
    pub fn fork(routine: &Routine) -> Self {
        Self::new(Rule::Fork(routine.clone()))
    }

    /// Match every spawn.
    pub fn any_fork() -> Self {
        Self::new(Rule::AnyFork)
    }

    /// Match every effect.
    pub fn any() -> Self {
        Self::new(Rule::Any)
    }

    /// Match effects using a custom predicate.
    pub fn by_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Effect) -> bool + Send + Sync + 'static,
    {
        Self::new(Rule::Predicate(Arc::new(predicate)))
    }

    /// Returns true if the effect itself, ignoring anything nested in it, matches.
    pub fn matches_leaf(&self, effect: &Effect) -> bool {
        match (&self.rule, effect) {
            (Rule::Effect(expected), actual) => expected == actual,
            (Rule::PutAction(expected), Effect::Put(message)) => {
                value_match::is_match(message, expected)
            }
            (Rule::TakeAction(expected), Effect::Take(pattern)) => expected == pattern,
            (Rule::Call(expected), Effect::Call { func, .. }) => expected == func,
            (Rule::CallWithArgs(expected, expected_args), Effect::Call { func, args }) => {
                expected == func && value_match::args_match(args, expected_args)
            }
            (Rule::CallWithExactArgs(expected, expected_args), Effect::Call { func, args }) => {
                expected == func && args == expected_args
            }
            (Rule::Fork(expected), Effect::Fork { routine, .. }) => expected == routine,
            (Rule::AnyFork, Effect::Fork { .. }) => true,
            (Rule::Any, _) => true,
            (Rule::Predicate(f), actual) => f(actual),
            _ => false,
        }
    }

    /// Returns true if the effect, or any effect nested inside it, matches.
    pub fn matches(&self, effect: &Effect) -> bool {
        matches_recursive(effect, &|e: &Effect| self.matches_leaf(e))
    }

    /// The function this matcher targets, if any.
    pub(crate) fn func(&self) -> Option<&Func> {
        match &self.rule {
            Rule::Call(func) | Rule::CallWithArgs(func, _) | Rule::CallWithExactArgs(func, _) => {
                Some(func)
            }
            _ => None,
        }
    }
}

impl PartialEq for EffectMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (&self.rule, &other.rule) {
            (Rule::Effect(a), Rule::Effect(b)) => a == b,
            (Rule::PutAction(a), Rule::PutAction(b)) => a == b,
            (Rule::TakeAction(a), Rule::TakeAction(b)) => a == b,
            (Rule::Call(a), Rule::Call(b)) => a == b,
            (Rule::CallWithArgs(a, x), Rule::CallWithArgs(b, y)) => a == b && x == y,
            (Rule::CallWithExactArgs(a, x), Rule::CallWithExactArgs(b, y)) => a == b && x == y,
            (Rule::Fork(a), Rule::Fork(b)) => a == b,
            (Rule::AnyFork, Rule::AnyFork) => true,
            (Rule::Any, Rule::Any) => true,
            (Rule::Predicate(a), Rule::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for EffectMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Rule::Effect(e) => write!(f, "EffectMatcher::by_effect({e})"),
            Rule::PutAction(m) => write!(f, "EffectMatcher::put_action({m})"),
            Rule::TakeAction(p) => write!(f, "EffectMatcher::take_action({p:?})"),
            Rule::Call(func) => write!(f, "EffectMatcher::call({func})"),
            Rule::CallWithArgs(func, args) => {
                write!(f, "EffectMatcher::call_with_args({func}, {args:?})")
            }
            Rule::CallWithExactArgs(func, args) => {
                write!(f, "EffectMatcher::call_with_exact_args({func}, {args:?})")
            }
            Rule::Fork(routine) => write!(f, "EffectMatcher::fork({})", routine.name()),
            Rule::AnyFork => write!(f, "EffectMatcher::any_fork()"),
            Rule::Any => write!(f, "EffectMatcher::any()"),
            Rule::Predicate(_) => write!(f, "EffectMatcher::by_predicate(..)"),
        }
    }
}

impl From<Effect> for EffectMatcher {
    fn from(effect: Effect) -> Self {
        EffectMatcher::by_effect(effect)
    }
}

impl From<&Func> for EffectMatcher {
    fn from(func: &Func) -> Self {
        EffectMatcher::call(func)
    }
}

impl From<&Routine> for EffectMatcher {
    fn from(routine: &Routine) -> Self {
        EffectMatcher::fork(routine)
    }
}
