use std::{
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::runtime::Handle;

use crate::{Effect, EffectMatcher};

pub(crate) type Callback = Arc<dyn Fn(&Effect) + Send + Sync>;

/// A callback fired for every recorded effect its matcher selects.
#[derive(Clone)]
pub struct Listener {
    matcher: EffectMatcher,
    callback: Callback,
}

impl Listener {
    pub(crate) fn new(matcher: EffectMatcher, callback: Callback) -> Self {
        Self { matcher, callback }
    }

    pub fn matcher(&self) -> &EffectMatcher {
        &self.matcher
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Number of listener batches spawned but not yet finished.
#[derive(Clone, Default, Debug)]
pub(crate) struct Pending(Arc<AtomicUsize>);

impl Pending {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn enter(&self) -> PendingGuard {
        self.0.fetch_add(1, Ordering::AcqRel);
        PendingGuard(self.0.clone())
    }
}

// Decrements on drop, so a panicking callback still releases its slot.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Listeners registered on one mocked task, in registration order.
#[derive(Clone, Default)]
pub(crate) struct ListenerSet {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl ListenerSet {
    pub fn register(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Schedule every matching callback to run once the current step yields.
    ///
    /// Callbacks for one effect run in registration order on a single
    /// spawned task. Nothing runs inline.
    pub fn fire(&self, effect: &Effect, pending: &Pending) {
        let callbacks: Vec<Callback> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.matcher.matches(effect))
            .map(|l| l.callback.clone())
            .collect();

        if callbacks.is_empty() {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(
                effect = %effect,
                listeners = callbacks.len(),
                "No Tokio runtime, dropping listener callbacks"
            );
            return;
        };

        tracing::trace!(effect = %effect, listeners = callbacks.len(), "Scheduling listeners");
        let guard = pending.enter();
        let effect = effect.clone();
        handle.spawn(async move {
            let _guard = guard;
            for callback in callbacks {
                callback(&effect);
            }
        });
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}
