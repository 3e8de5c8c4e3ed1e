use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::Value;

use crate::{BoxFuture, Effect, Error, MockContext, Result, Routine, Runner, TaskContext};

pub(crate) type StateCell = Arc<Mutex<DriverState>>;

/// Where a driven task currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriverState {
    /// Not started yet.
    #[default]
    Ready,
    /// Running up to its next effect or its return.
    Stepping,
    /// Suspended until the runner resolves the last effect.
    WaitingOnRunner,
    /// Returned `Ok`.
    Done,
    /// Returned `Err`.
    Failed,
}

impl DriverState {
    pub fn is_finished(&self) -> bool {
        matches!(self, DriverState::Done | DriverState::Failed)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Ready => write!(f, "Ready"),
            DriverState::Stepping => write!(f, "Stepping"),
            DriverState::WaitingOnRunner => write!(f, "WaitingOnRunner"),
            DriverState::Done => write!(f, "Done"),
            DriverState::Failed => write!(f, "Failed"),
        }
    }
}

/// What a suspended task is resumed with.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Resumed(Value),
    Failed(Error),
}

impl StepOutcome {
    /// The form the task observes at its suspension point.
    pub fn into_result(self) -> Result<Value> {
        match self {
            StepOutcome::Resumed(value) => Ok(value),
            StepOutcome::Failed(error) => Err(error),
        }
    }
}

impl From<Result<Value>> for StepOutcome {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => StepOutcome::Resumed(value),
            Err(error) => StepOutcome::Failed(error),
        }
    }
}

/// Steps one task, standing between it and the real runner.
///
/// For every effect the task emits, the driver:
/// 1. appends the raw effect to the shared trace,
/// 2. runs the stubs over the effect,
/// 3. forwards the result to the real runner, or fails the task at its
///    suspension point if a stub failed,
/// 4. schedules listeners matching the raw effect (never inline).
///
/// The driver is itself a [`Runner`], so the task cannot tell it apart from
/// the runner it wraps.
pub struct Driver {
    name: Arc<str>,
    ctx: MockContext,
    inner: Arc<dyn Runner>,
    state: StateCell,
}

impl Driver {
    pub(crate) fn new(
        name: Arc<str>,
        ctx: MockContext,
        inner: Arc<dyn Runner>,
        state: Option<StateCell>,
    ) -> Self {
        Self {
            name,
            ctx,
            inner,
            state: state.unwrap_or_default(),
        }
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(state: &StateCell, next: DriverState) {
        *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Run the routine to completion with this driver as its runner.
    pub(crate) fn drive(
        self: Arc<Self>,
        routine: Routine,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            Driver::set_state(&self.state, DriverState::Stepping);
            let result = routine
                .start(TaskContext::new(self.clone()), args)
                .await;

            let finished = match &result {
                Ok(_) => DriverState::Done,
                Err(_) => DriverState::Failed,
            };
            Driver::set_state(&self.state, finished);
            tracing::debug!(task = %self.name, state = %finished, effects = self.ctx.trace().len(), "Task finished");
            result
        })
    }
}

impl Runner for Driver {
    fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>> {
        let index = self.ctx.trace().push(effect.clone());
        tracing::trace!(task = %self.name, index, kind = %effect.kind(), "Recorded effect");

        // The runner sees the effect now, even though the task only
        // observes the outcome once the returned future is polled.
        let forwarded = self
            .ctx
            .stubs()
            .apply(&effect, &self.ctx)
            .map(|rewritten| self.inner.run(rewritten));

        // Only after forwarding, so no listener can act ahead of the runner.
        self.ctx.listeners().fire(&effect, self.ctx.pending());

        let state = self.state.clone();
        Driver::set_state(&state, DriverState::WaitingOnRunner);
        Box::pin(async move {
            let outcome = match forwarded {
                Ok(resolution) => StepOutcome::from(resolution.await),
                Err(error) => StepOutcome::Failed(error),
            };
            Driver::set_state(&state, DriverState::Stepping);
            outcome.into_result()
        })
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EffectMatcher, Func, Listener, Stub, expectation::settle_contexts};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolves every effect with its wire form, counting calls.
    #[derive(Default)]
    struct Echo {
        calls: AtomicUsize,
    }

    impl Runner for Echo {
        fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(std::future::ready(Ok(effect.to_value())))
        }
    }

    fn driver(ctx: &MockContext, inner: Arc<Echo>) -> Arc<Driver> {
        Arc::new(Driver::new(Arc::from("test"), ctx.clone(), inner, None))
    }

    #[tokio::test]
    async fn records_raw_effect_and_forwards_rewritten() {
        let ctx = MockContext::default();
        let (f, g) = (Func::declare("f"), Func::declare("g"));
        ctx.stubs().register(Stub::func(EffectMatcher::call(&f), g.clone()));
        let echo = Arc::new(Echo::default());
        let driver = driver(&ctx, echo.clone());

        let resolved = driver.run(Effect::call(&f, vec![json!(1)])).await.unwrap();

        assert_eq!(ctx.trace().get(0), Some(Effect::call(&f, vec![json!(1)])));
        assert_eq!(resolved, Effect::call(&g, vec![json!(1)]).to_value());
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_stub_skips_runner() {
        let ctx = MockContext::default();
        ctx.stubs().register(Stub::with(
            EffectMatcher::take_action("X"),
            Arc::new(|_: &Effect| -> Result<Effect> { Err(Error::raised("stubbed")) }),
        ));
        let echo = Arc::new(Echo::default());
        let driver = driver(&ctx, echo.clone());

        let outcome = driver.run(Effect::take("X")).await;

        assert_eq!(outcome, Err(Error::raised("stubbed")));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.trace().len(), 1);
    }

    #[tokio::test]
    async fn state_follows_the_task() {
        let ctx = MockContext::default();
        let driver = driver(&ctx, Arc::new(Echo::default()));
        assert_eq!(driver.state(), DriverState::Ready);

        let failing = Routine::new("failing", |ctx: TaskContext, _| async move {
            ctx.take("A").await?;
            Err::<Value, _>(Error::raised("gave up"))
        });
        let result = driver.clone().drive(failing, vec![]).await;

        assert_eq!(result, Err(Error::raised("gave up")));
        assert_eq!(driver.state(), DriverState::Failed);
        assert!(driver.state().is_finished());
    }

    /// Blocks its thread before recording that it saw the effect.
    struct Slow {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Runner for Slow {
        fn run(&self, _: Effect) -> BoxFuture<'static, Result<Value>> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.log.lock().unwrap().push("runner");
            Box::pin(std::future::ready(Ok(Value::Null)))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runner_receives_effect_before_listeners_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = MockContext::default();
        let seen = log.clone();
        ctx.listeners().register(Listener::new(
            EffectMatcher::any(),
            Arc::new(move |_: &Effect| seen.lock().unwrap().push("listener")),
        ));
        let slow = Arc::new(Slow { log: log.clone() });
        let driver = Arc::new(Driver::new(Arc::from("slow"), ctx.clone(), slow, None));

        driver.run(Effect::take("A")).await.unwrap();
        settle_contexts(&[ctx]).await;

        assert_eq!(*log.lock().unwrap(), vec!["runner", "listener"]);
    }

    #[test]
    fn outcome_converts_to_result() {
        assert_eq!(StepOutcome::Resumed(json!(1)).into_result(), Ok(json!(1)));
        assert_eq!(
            StepOutcome::from(Err(Error::raised("x"))),
            StepOutcome::Failed(Error::raised("x"))
        );
    }
}
