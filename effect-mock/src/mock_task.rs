use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{
    BoxFuture, Config, DriverState, Error, MockContext, Mocked, Result, Routine, Runner, Task,
    TaskSpec, driver::StateCell,
};

/// A single mocked task.
///
/// Wraps a [`Task`] or a [`Routine`] so that every run is stepped by a
/// [`Driver`](crate::Driver): effects are recorded, listeners notified and
/// stubs applied before anything reaches the real runner. Tasks the wrapped
/// routine spawns are wrapped the same way and share this mock's trace.
///
/// # Example
///
/// ```ignore
/// let mock = MockTask::new(checkout.with_args(vec![json!(42)]))?;
/// mock.stub_call(&payments.charge, &fake_charge)?;
///
/// mock.run(runner).await?;
///
/// assert!(mock.query().put_action(json!({"type": "CHECKOUT_DONE"})).is_present());
/// ```
pub struct MockTask {
    routine: Routine,
    args: Option<Vec<Value>>,
    ctx: MockContext,
    state: StateCell,
}

impl MockTask {
    pub fn new(spec: impl Into<TaskSpec>) -> Result<Self> {
        Self::with_config(spec, Config::default())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a group; use
    /// [`MockGroup`](crate::MockGroup) for those.
    pub fn with_config(spec: impl Into<TaskSpec>, config: Config) -> Result<Self> {
        let (routine, args) = match spec.into() {
            TaskSpec::Task(task) => (task.routine().clone(), Some(task.args().to_vec())),
            TaskSpec::Routine(routine) => (routine, None),
            TaskSpec::Group(specs) => {
                return Err(Error::InvalidInput(format!(
                    "expected a single task, got a group of {}",
                    specs.len()
                )));
            }
        };
        Ok(Self {
            routine,
            args,
            ctx: MockContext::new(config),
            state: StateCell::default(),
        })
    }

    #[inline]
    pub fn context(&self) -> &MockContext {
        &self.ctx
    }

    /// State of the most recently started root run.
    pub fn state(&self) -> DriverState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The wrapped routine. Every run of it is recorded by this mock.
    pub fn routine(&self) -> Routine {
        self.ctx.intercept(&self.routine, Some(self.state.clone()))
    }

    /// The wrapped task instance.
    ///
    /// A mock built from a [`Task`] keeps its bound arguments; one built
    /// from a [`Routine`] is bound to no arguments.
    pub fn task(&self) -> Task {
        Task::new(self.routine(), self.args.clone().unwrap_or_default())
    }

    /// Run the wrapped task to completion against `runner`.
    pub fn run(&self, runner: Arc<dyn Runner>) -> BoxFuture<'static, Result<Value>> {
        self.task().run(runner)
    }
}

impl Mocked for MockTask {
    fn contexts(&self) -> Vec<&MockContext> {
        vec![&self.ctx]
    }
}

impl fmt::Debug for MockTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTask")
            .field("routine", &self.routine)
            .field("args", &self.args)
            .field("state", &self.state())
            .field("effects", &self.ctx.trace().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Effect, TaskContext};
    use serde_json::json;

    struct Echo;

    impl Runner for Echo {
        fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>> {
            Box::pin(std::future::ready(Ok(effect.to_value())))
        }
    }

    fn greeter() -> Routine {
        Routine::new("greeter", |ctx: TaskContext, args| async move {
            let name = args.first().cloned().unwrap_or(json!("world"));
            ctx.put(json!({"type": "GREETED", "name": name})).await
        })
    }

    #[test]
    fn group_is_rejected() {
        let result = MockTask::new(vec![greeter(), greeter()]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn task_keeps_bound_arguments() {
        let mock = MockTask::new(greeter().with_args(vec![json!("ada")])).unwrap();
        assert_eq!(mock.state(), DriverState::Ready);

        mock.run(Arc::new(Echo)).await.unwrap();

        assert_eq!(mock.state(), DriverState::Done);
        assert!(
            mock.query()
                .put_action(json!({"type": "GREETED", "name": "ada"}))
                .is_present()
        );
    }

    #[tokio::test]
    async fn routine_runs_are_all_recorded() {
        let mock = MockTask::new(greeter()).unwrap();
        let routine = mock.routine();
        assert_eq!(routine.name(), "greeter");

        routine.with_args(vec![json!("a")]).run(Arc::new(Echo)).await.unwrap();
        routine.with_args(vec![json!("b")]).run(Arc::new(Echo)).await.unwrap();

        assert_eq!(mock.effect_count(), 2);
        assert_eq!(
            mock.query().put_action(json!({"type": "GREETED"})).number(2).effects(),
            vec![Effect::put(json!({"type": "GREETED", "name": "b"}))]
        );
    }
}
