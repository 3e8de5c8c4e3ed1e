use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{Effect, Func, Pattern, Result, Routine, Runner};

/// Runner-provided context through which a task emits its effects.
///
/// Each method builds an [`Effect`], hands it to the runner and suspends
/// until the runner reports back:
/// - `put(message)`: dispatch a message
/// - `take(pattern)`: wait for a message matching the pattern
/// - `call(func, args)`: invoke a function
/// - `fork(routine, args)`: spawn a nested task
/// - `all(effects)` / `race(entries)`: compose effects
/// - `effect(effect)`: emit any effect directly
///
/// A failure reported by the runner comes back as `Err` from the awaited
/// call, so tasks recover from it with ordinary `match` or `?`.
///
/// See also: [`Routine`], [`Runner`].
#[derive(Clone)]
pub struct TaskContext {
    runner: Arc<dyn Runner>,
}

impl TaskContext {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// The runner this context forwards effects to.
    #[inline]
    pub fn runner(&self) -> Arc<dyn Runner> {
        self.runner.clone()
    }

    /// Emit an effect and suspend until the runner resolves it.
    pub async fn effect(&self, effect: Effect) -> Result<Value> {
        self.runner.run(effect).await
    }

    pub async fn put(&self, message: Value) -> Result<Value> {
        self.effect(Effect::Put(message)).await
    }

    pub async fn take(&self, pattern: impl Into<Pattern>) -> Result<Value> {
        self.effect(Effect::Take(pattern.into())).await
    }

    pub async fn call(&self, func: &Func, args: Vec<Value>) -> Result<Value> {
        self.effect(Effect::call(func, args)).await
    }

    pub async fn fork(&self, routine: &Routine, args: Vec<Value>) -> Result<Value> {
        self.effect(Effect::fork(routine, args)).await
    }

    /// Resolves with the results of every effect, in order.
    pub async fn all(&self, effects: Vec<Effect>) -> Result<Value> {
        self.effect(Effect::All(effects)).await
    }

    /// Resolves with an object holding only the winning entry.
    pub async fn race<K: Into<String>>(
        &self,
        entries: impl IntoIterator<Item = (K, Effect)>,
    ) -> Result<Value> {
        self.effect(Effect::race(entries)).await
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext").finish_non_exhaustive()
    }
}
