use std::{fmt, future::Future, sync::Arc};

use serde_json::Value;

use crate::{BoxFuture, Result, Runner, TaskContext};

pub(crate) type RoutineBody =
    Arc<dyn Fn(TaskContext, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A task-producing routine: the factory form of a task.
///
/// A routine is an async body that receives a [`TaskContext`] and its
/// arguments. Every interaction with the outside world goes through the
/// context as an [`Effect`](crate::Effect), which is what makes the task
/// observable by the harness.
///
/// Routines compare by identity, like [`Func`](crate::Func). A routine
/// wrapped by a mock keeps the identity of the routine it wraps.
///
/// # Example
///
/// ```rust
/// use effect_mock::{Routine, TaskContext};
/// use serde_json::json;
///
/// let greeter = Routine::new("greeter", |ctx: TaskContext, args| async move {
///     let name = args.first().cloned().unwrap_or(json!("world"));
///     ctx.put(json!({"type": "GREETED", "name": name})).await
/// });
/// ```
#[derive(Clone)]
pub struct Routine {
    name: Arc<str>,
    body: RoutineBody,
    identity: RoutineBody,
}

impl Routine {
    pub fn new<F, Fut>(name: &str, body: F) -> Self
    where
        F: Fn(TaskContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let body: RoutineBody = Arc::new(
            move |ctx, args| -> BoxFuture<'static, Result<Value>> { Box::pin(body(ctx, args)) },
        );
        Self {
            name: Arc::from(name),
            identity: body.clone(),
            body,
        }
    }

    /// A routine that runs `body` but stands for `original`.
    pub(crate) fn wrapping(original: &Routine, body: RoutineBody) -> Self {
        Self {
            name: original.name.clone(),
            body,
            identity: original.identity.clone(),
        }
    }

    /// Whether this routine runs a body other than the one it stands for.
    pub(crate) fn is_wrapped(&self) -> bool {
        !Arc::ptr_eq(&self.body, &self.identity)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Start the routine with the given context and arguments.
    pub fn start(&self, ctx: TaskContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        (self.body)(ctx, args)
    }

    /// Bind arguments, producing a ready-to-run [`Task`].
    pub fn with_args(&self, args: Vec<Value>) -> Task {
        Task::new(self.clone(), args)
    }
}

impl PartialEq for Routine {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.identity, &other.identity)
    }
}

impl Eq for Routine {}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Routine({})", self.name)
    }
}

/// A ready-to-run task: a routine with its arguments bound.
#[derive(Clone, Debug)]
pub struct Task {
    routine: Routine,
    args: Vec<Value>,
}

impl Task {
    pub fn new(routine: Routine, args: Vec<Value>) -> Self {
        Self { routine, args }
    }

    #[inline]
    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Run the task to completion against the given runner.
    pub fn run(self, runner: Arc<dyn Runner>) -> BoxFuture<'static, Result<Value>> {
        self.routine.start(TaskContext::new(runner), self.args)
    }
}

/// What the mocking entry points accept.
///
/// Build it with `.into()` from a [`Task`], a [`Routine`], or a `Vec` of
/// either.
#[derive(Clone, Debug)]
pub enum TaskSpec {
    /// A ready-to-run task instance.
    Task(Task),
    /// A factory for task instances.
    Routine(Routine),
    /// Several independent tasks, mocked side by side.
    Group(Vec<TaskSpec>),
}

impl From<Task> for TaskSpec {
    fn from(task: Task) -> Self {
        TaskSpec::Task(task)
    }
}

impl From<Routine> for TaskSpec {
    fn from(routine: Routine) -> Self {
        TaskSpec::Routine(routine)
    }
}

impl From<&Routine> for TaskSpec {
    fn from(routine: &Routine) -> Self {
        TaskSpec::Routine(routine.clone())
    }
}

impl<T: Into<TaskSpec>> From<Vec<T>> for TaskSpec {
    fn from(specs: Vec<T>) -> Self {
        TaskSpec::Group(specs.into_iter().map(Into::into).collect())
    }
}
