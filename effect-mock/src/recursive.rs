//! Matching and rewriting effects nested inside composites.
//!
//! Both walks follow the same shape: the leaf predicate is tried on the
//! effect itself first, then on every entry of a [`Race`](Effect::Race)
//! (insertion order) or element of an [`All`](Effect::All) (sequence order).
//! A [`Fork`](Effect::Fork) is a leaf: what the forked routine will emit
//! later is never inspected here.

use crate::{Effect, Result};

/// Returns true if `leaf` matches the effect or anything nested inside it.
pub fn matches_recursive<P>(effect: &Effect, leaf: &P) -> bool
where
    P: Fn(&Effect) -> bool + ?Sized,
{
    if leaf(effect) {
        return true;
    }
    match effect {
        Effect::Race(entries) => entries.iter().any(|(_, e)| matches_recursive(e, leaf)),
        Effect::All(effects) => effects.iter().any(|e| matches_recursive(e, leaf)),
        Effect::Put(_)
        | Effect::Take(_)
        | Effect::Call { .. }
        | Effect::Fork { .. }
        | Effect::Opaque(_) => false,
    }
}

/// Lift a leaf predicate into one that also looks inside composites.
pub fn to_recursive<P>(leaf: P) -> impl Fn(&Effect) -> bool
where
    P: Fn(&Effect) -> bool,
{
    move |effect: &Effect| matches_recursive(effect, &leaf)
}

/// Replace every effect matched by `leaf` with the output of `replace`.
///
/// Composites along the way are rebuilt, so the input is left untouched.
/// `replace` receives the original matched effect and returns its full
/// substitute.
///
/// # Errors
///
/// The first error returned by `replace` aborts the rewrite.
pub fn rewrite<P, R>(effect: &Effect, leaf: &P, replace: &R) -> Result<Effect>
where
    P: Fn(&Effect) -> bool + ?Sized,
    R: Fn(&Effect) -> Result<Effect> + ?Sized,
{
    if leaf(effect) {
        return replace(effect);
    }
    match effect {
        Effect::Race(entries) => entries
            .iter()
            .map(|(key, e)| Ok((key.clone(), rewrite(e, leaf, replace)?)))
            .collect::<Result<Vec<_>>>()
            .map(Effect::Race),
        Effect::All(effects) => effects
            .iter()
            .map(|e| rewrite(e, leaf, replace))
            .collect::<Result<Vec<_>>>()
            .map(Effect::All),
        Effect::Put(_)
        | Effect::Take(_)
        | Effect::Call { .. }
        | Effect::Fork { .. }
        | Effect::Opaque(_) => Ok(effect.clone()),
    }
}
