use std::fmt;

use serde_json::Value;

use crate::{Effect, EffectMatcher, Func, Pattern, Routine, Trace};

/// A range of one trace: `from` inclusive, `until` exclusive.
#[derive(Clone)]
struct Window {
    trace: Trace,
    from: usize,
    until: Option<usize>,
}

impl Window {
    fn whole(trace: Trace) -> Self {
        Self {
            trace,
            from: 0,
            until: None,
        }
    }

    fn empty(&self) -> Self {
        Self {
            trace: self.trace.clone(),
            from: 0,
            until: Some(0),
        }
    }

    fn scan(&self, matcher: &EffectMatcher) -> Vec<usize> {
        let effects = self.trace.snapshot();
        let until = self.until.map_or(effects.len(), |u| u.min(effects.len()));
        (self.from..until)
            .filter(|&i| matcher.matches(&effects[i]))
            .collect()
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.until {
            Some(until) => write!(f, "{}..{}", self.from, until),
            None => write!(f, "{}..", self.from),
        }
    }
}

/// A composable query over recorded effects.
///
/// A query covers one window per mocked task. Each base method scans every
/// window with the recursive matcher, so effects nested in `All` or `Race`
/// composites are found too, and returns a [`QueryResult`].
///
/// Queries read the live trace: every call sees the effects recorded so
/// far, nothing is cached.
///
/// Windows derived with [`QueryResult::followed_by`] and
/// [`QueryResult::preceded_by`] keep the other bound of the window they
/// came from, so `a.followed_by().x(..).preceded_by()` covers only the
/// effects between `a` and `x`, not everything before `x`.
///
/// # Example
///
/// ```ignore
/// let saved = mock.query().call(&save);
/// assert!(saved.is_present());
/// assert!(saved.followed_by().put_action(json!({"type": "SAVED"})).is_present());
/// assert!(!saved.preceded_by().take_action("CANCEL").is_present());
/// ```
#[derive(Clone)]
pub struct Query {
    windows: Vec<Window>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("windows", &self.windows)
            .finish()
    }
}

impl Query {
    pub(crate) fn new(traces: impl IntoIterator<Item = Trace>) -> Self {
        Self {
            windows: traces.into_iter().map(Window::whole).collect(),
        }
    }

    /// Effects deep-equal to `effect`.
    pub fn effect(&self, effect: Effect) -> QueryResult {
        self.matching(EffectMatcher::by_effect(effect))
    }

    /// Dispatches of a message containing the given fields.
    pub fn put_action(&self, message: Value) -> QueryResult {
        self.matching(EffectMatcher::put_action(message))
    }

    /// Waits on an equal pattern.
    pub fn take_action(&self, pattern: impl Into<Pattern>) -> QueryResult {
        self.matching(EffectMatcher::take_action(pattern))
    }

    /// Invocations of `func`, whatever the arguments.
    pub fn call(&self, func: &Func) -> QueryResult {
        self.matching(EffectMatcher::call(func))
    }

    /// Invocations of `func` whose leading arguments match `args`.
    pub fn call_with_args(&self, func: &Func, args: Vec<Value>) -> QueryResult {
        self.matching(EffectMatcher::call_with_args(func, args))
    }

    /// Invocations of `func` with exactly `args`.
    pub fn call_with_exact_args(&self, func: &Func, args: Vec<Value>) -> QueryResult {
        self.matching(EffectMatcher::call_with_exact_args(func, args))
    }

    /// Spawns of `routine`.
    pub fn fork(&self, routine: &Routine) -> QueryResult {
        self.matching(EffectMatcher::fork(routine))
    }

    /// Every effect in the window.
    pub fn all_effects(&self) -> QueryResult {
        self.matching(EffectMatcher::any())
    }

    pub fn matching(&self, matcher: impl Into<EffectMatcher>) -> QueryResult {
        let matcher = matcher.into();
        QueryResult {
            hits: self
                .windows
                .iter()
                .map(|window| Hit {
                    indexes: window.scan(&matcher),
                    window: window.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
struct Hit {
    window: Window,
    indexes: Vec<usize>,
}

/// The effects a [`Query`] matched, in trace order.
///
/// For a group of mocked tasks, the result concatenates each task's matches
/// in task order. Indexes refer to each task's own trace, so indexes from
/// different tasks are not comparable.
#[derive(Clone, Debug)]
pub struct QueryResult {
    hits: Vec<Hit>,
}

impl QueryResult {
    pub fn is_present(&self) -> bool {
        self.hits.iter().any(|h| !h.indexes.is_empty())
    }

    pub fn count(&self) -> usize {
        self.hits.iter().map(|h| h.indexes.len()).sum()
    }

    /// Matched positions, ascending within each task's trace.
    pub fn indexes(&self) -> Vec<usize> {
        self.hits
            .iter()
            .flat_map(|h| h.indexes.iter().copied())
            .collect()
    }

    /// The matched effects, read from the trace.
    pub fn effects(&self) -> Vec<Effect> {
        self.hits
            .iter()
            .flat_map(|h| h.indexes.iter().filter_map(|&i| h.window.trace.get(i)))
            .collect()
    }

    pub fn first(&self) -> QueryResult {
        self.keep_nth(0)
    }

    pub fn last(&self) -> QueryResult {
        match self.count() {
            0 => self.keep_nth(usize::MAX),
            n => self.keep_nth(n - 1),
        }
    }

    /// Keep only the `n`th match, counting from 1. Zero keeps nothing.
    pub fn number(&self, n: usize) -> QueryResult {
        match n.checked_sub(1) {
            Some(position) => self.keep_nth(position),
            None => self.keep_nth(usize::MAX),
        }
    }

    fn keep_nth(&self, position: usize) -> QueryResult {
        let mut seen = 0;
        let hits = self
            .hits
            .iter()
            .map(|hit| {
                let indexes = match position.checked_sub(seen) {
                    Some(offset) if offset < hit.indexes.len() => vec![hit.indexes[offset]],
                    _ => Vec::new(),
                };
                seen += hit.indexes.len();
                Hit {
                    window: hit.window.clone(),
                    indexes,
                }
            })
            .collect();
        QueryResult { hits }
    }

    /// A query over what was recorded after the last match.
    ///
    /// The new window keeps the upper bound of the window this result was
    /// taken from. Tasks without a match get an empty window.
    pub fn followed_by(&self) -> Query {
        Query {
            windows: self
                .hits
                .iter()
                .map(|hit| match hit.indexes.last() {
                    Some(&last) => Window {
                        trace: hit.window.trace.clone(),
                        from: last + 1,
                        until: hit.window.until,
                    },
                    None => hit.window.empty(),
                })
                .collect(),
        }
    }

    /// A query over what was recorded before the first match.
    ///
    /// The new window keeps the lower bound of the window this result was
    /// taken from. Tasks without a match get an empty window.
    pub fn preceded_by(&self) -> Query {
        Query {
            windows: self
                .hits
                .iter()
                .map(|hit| match hit.indexes.first() {
                    Some(&first) => Window {
                        trace: hit.window.trace.clone(),
                        from: hit.window.from,
                        until: Some(first),
                    },
                    None => hit.window.empty(),
                })
                .collect(),
        }
    }
}
