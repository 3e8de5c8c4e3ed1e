use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::Effect;

/// Append-only record of the effects a mocked task emitted.
///
/// One entry per suspension point, in emission order. A trace is shared by
/// the task's driver, the drivers of any subtasks it spawns, and the
/// facade that queries it, so cloning a `Trace` yields another handle to
/// the same storage. Indexes never move once assigned; only
/// [`clear`](Self::clear) resets the trace.
#[derive(Clone, Default)]
pub struct Trace {
    effects: Arc<Mutex<Vec<Effect>>>,
}

impl Trace {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            effects: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Effect>> {
        self.effects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an effect, returning its index.
    pub(crate) fn push(&self, effect: Effect) -> usize {
        let mut effects = self.lock();
        effects.push(effect);
        effects.len() - 1
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Effect> {
        self.lock().get(index).cloned()
    }

    /// Copy of every effect recorded so far.
    pub fn snapshot(&self) -> Vec<Effect> {
        self.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    /// Returns true if both handles point at the same storage.
    pub fn same_as(&self, other: &Trace) -> bool {
        Arc::ptr_eq(&self.effects, &other.effects)
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace").field("len", &self.len()).finish()
    }
}
