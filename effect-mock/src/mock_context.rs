use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{
    BoxFuture, Config, Driver, Result, Routine, TaskContext, Trace,
    driver::StateCell,
    listener::{ListenerSet, Pending},
    stub::StubList,
};

/// Shared state of one mocked task.
///
/// Holds the trace, the listeners, the stubs and the count of pending
/// listener batches. Every driver working for the task, including the
/// drivers of spawned subtasks at any depth, holds a clone of the same
/// context, so they all record into one trace and obey one configuration.
#[derive(Clone)]
pub struct MockContext {
    trace: Trace,
    listeners: ListenerSet,
    stubs: StubList,
    pending: Pending,
    config: Arc<Config>,
}

impl Default for MockContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl MockContext {
    pub fn new(config: Config) -> Self {
        Self {
            trace: Trace::with_capacity(config.trace_capacity()),
            listeners: ListenerSet::default(),
            stubs: StubList::default(),
            pending: Pending::default(),
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub(crate) fn stubs(&self) -> &StubList {
        &self.stubs
    }

    pub(crate) fn pending(&self) -> &Pending {
        &self.pending
    }

    /// Wrap a routine so every run of it is stepped by a driver over this
    /// context, in front of whatever runner starts it.
    ///
    /// The wrapper compares equal to `routine`, so fork matchers keep
    /// matching it.
    pub(crate) fn intercept(&self, routine: &Routine, state: Option<StateCell>) -> Routine {
        let ctx = self.clone();
        let original = routine.clone();
        Routine::wrapping(
            routine,
            Arc::new(
                move |task_ctx: TaskContext, args: Vec<Value>| -> BoxFuture<'static, Result<Value>> {
                    let driver = Driver::new(
                        original.name_arc(),
                        ctx.clone(),
                        task_ctx.runner(),
                        state.clone(),
                    );
                    Arc::new(driver).drive(original.clone(), args)
                },
            ),
        )
    }
}

impl fmt::Debug for MockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockContext")
            .field("trace", &self.trace)
            .field("listeners", &self.listeners)
            .field("stubs", &self.stubs)
            .field("pending", &self.pending.count())
            .finish()
    }
}
