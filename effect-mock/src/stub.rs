use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{Effect, EffectMatcher, Func, MockContext, Result, recursive::rewrite};

pub(crate) type Producer = Arc<dyn Fn(&Effect) -> Result<Effect> + Send + Sync>;

#[derive(Clone)]
enum Replacement {
    /// Wrap a spawned routine so its effects are recorded too. Routines
    /// that are already wrapped pass through.
    InterceptSpawn,
    /// Swap the invoked function, keeping the arguments.
    Func(Func),
    With(Producer),
}

/// A rewrite applied to matching effects before they reach the runner.
#[derive(Clone)]
pub struct Stub {
    matcher: EffectMatcher,
    replacement: Replacement,
}

impl Stub {
    fn intercept_spawn() -> Self {
        Self {
            matcher: EffectMatcher::any_fork(),
            replacement: Replacement::InterceptSpawn,
        }
    }

    pub(crate) fn func(matcher: EffectMatcher, func: Func) -> Self {
        Self {
            matcher,
            replacement: Replacement::Func(func),
        }
    }

    pub(crate) fn with(matcher: EffectMatcher, producer: Producer) -> Self {
        Self {
            matcher,
            replacement: Replacement::With(producer),
        }
    }

    pub fn matcher(&self) -> &EffectMatcher {
        &self.matcher
    }

    fn replace(&self, effect: &Effect, ctx: &MockContext) -> Result<Effect> {
        let replaced = match (&self.replacement, effect) {
            (Replacement::InterceptSpawn, Effect::Fork { routine, .. }) if routine.is_wrapped() => {
                return Ok(effect.clone());
            }
            (Replacement::InterceptSpawn, Effect::Fork { routine, args }) => {
                tracing::debug!(routine = routine.name(), "Intercepting spawned task");
                return Ok(Effect::Fork {
                    routine: ctx.intercept(routine, None),
                    args: args.clone(),
                });
            }
            (Replacement::Func(func), Effect::Call { args, .. }) => Ok(Effect::Call {
                func: func.clone(),
                args: args.clone(),
            }),
            (Replacement::With(producer), effect) => producer(effect),
            (_, effect) => Ok(effect.clone()),
        };

        match &replaced {
            Ok(replacement) => {
                tracing::debug!(matcher = ?self.matcher, from = %effect, to = %replacement, "Stub rewrote effect");
            }
            Err(e) => {
                tracing::warn!(matcher = ?self.matcher, effect = %effect, error = %e, "Stub failed");
            }
        }
        replaced
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let replacement = match &self.replacement {
            Replacement::InterceptSpawn => "intercept_spawn".to_string(),
            Replacement::Func(func) => func.to_string(),
            Replacement::With(_) => "producer".to_string(),
        };
        f.debug_struct("Stub")
            .field("matcher", &self.matcher)
            .field("replacement", &replacement)
            .finish()
    }
}

/// Stubs registered on one mocked task, in application order.
///
/// The spawn interceptor is not part of the list. It runs after every user
/// stub, over the fully rewritten effect, and survives [`reset`](Self::reset).
#[derive(Clone)]
pub(crate) struct StubList {
    stubs: Arc<RwLock<Vec<Stub>>>,
    interceptor: Stub,
}

impl Default for StubList {
    fn default() -> Self {
        Self {
            stubs: Arc::default(),
            interceptor: Stub::intercept_spawn(),
        }
    }
}

impl StubList {
    /// Add a stub, or swap the replacement of the stub with an equal matcher.
    pub fn register(&self, stub: Stub) {
        let mut stubs = self.stubs.write().unwrap_or_else(PoisonError::into_inner);
        match stubs.iter_mut().find(|s| s.matcher == stub.matcher) {
            Some(existing) => existing.replacement = stub.replacement,
            None => stubs.push(stub),
        }
    }

    /// Drop every user stub.
    pub fn reset(&self) {
        self.stubs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn snapshot(&self) -> Vec<Stub> {
        self.stubs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run every stub over the effect, each on the previous one's output,
    /// then wrap whatever spawns remain.
    ///
    /// The list is copied first, so producers may register stubs without
    /// deadlocking.
    pub fn apply(&self, effect: &Effect, ctx: &MockContext) -> Result<Effect> {
        self.snapshot()
            .iter()
            .chain(std::iter::once(&self.interceptor))
            .try_fold(effect.clone(), |current, stub| {
                rewrite(
                    &current,
                    &|e: &Effect| stub.matcher.matches_leaf(e),
                    &|e: &Effect| stub.replace(e, ctx),
                )
            })
    }
}

impl fmt::Debug for StubList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.snapshot())
            .entry(&self.interceptor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoxFuture, Error, Routine, Runner, TaskContext};
    use serde_json::{Value, json};

    fn replacement_name(list: &StubList, index: usize) -> String {
        format!("{:?}", list.snapshot()[index])
    }

    fn idle(name: &str) -> Routine {
        Routine::new(name, |_, _| async { Ok(Value::Null) })
    }

    fn forked_routine(effect: Effect) -> Routine {
        let Effect::Fork { routine, .. } = effect else {
            panic!("expected fork, got {effect:?}");
        };
        routine
    }

    #[test]
    fn starts_without_user_stubs() {
        let list = StubList::default();
        assert!(list.snapshot().is_empty());
        assert!(format!("{list:?}").contains("intercept_spawn"));
    }

    #[test]
    fn equal_matcher_replaces_in_place() {
        let list = StubList::default();
        let f = Func::declare("f");
        let g = Func::declare("g");
        list.register(Stub::func(EffectMatcher::call(&f), Func::declare("first")));
        list.register(Stub::func(EffectMatcher::call(&g), Func::declare("other")));
        list.register(Stub::func(EffectMatcher::call(&f), Func::declare("second")));

        assert_eq!(list.snapshot().len(), 2);
        assert!(replacement_name(&list, 0).contains("second"));
        assert!(replacement_name(&list, 1).contains("other"));
    }

    #[test]
    fn user_fork_stub_still_gets_intercepted() {
        let ctx = MockContext::default();
        let passthrough: Producer = Arc::new(|e: &Effect| -> Result<Effect> { Ok(e.clone()) });
        ctx.stubs().register(Stub::with(EffectMatcher::any_fork(), passthrough));
        assert_eq!(ctx.stubs().snapshot().len(), 1);

        let child = idle("child");
        let rewritten = ctx.stubs().apply(&Effect::fork(&child, vec![]), &ctx).unwrap();
        assert!(forked_routine(rewritten).is_wrapped());
    }

    #[test]
    fn fork_matcher_sees_the_original_routine() {
        let ctx = MockContext::default();
        let child = idle("child");
        ctx.stubs().register(Stub::with(
            EffectMatcher::fork(&child),
            Arc::new(|_: &Effect| -> Result<Effect> { Ok(Effect::put(json!({"type": "REPLACED"}))) }),
        ));

        let rewritten = ctx.stubs().apply(&Effect::fork(&child, vec![]), &ctx).unwrap();
        assert_eq!(rewritten, Effect::put(json!({"type": "REPLACED"})));
    }

    #[test]
    fn spawns_produced_by_stubs_are_intercepted() {
        let ctx = MockContext::default();
        let worker = idle("worker");
        let spawned = worker.clone();
        ctx.stubs().register(Stub::with(
            EffectMatcher::take_action("WORK"),
            Arc::new(move |_: &Effect| -> Result<Effect> { Ok(Effect::fork(&spawned, vec![])) }),
        ));

        let rewritten = ctx.stubs().apply(&Effect::take("WORK"), &ctx).unwrap();
        let routine = forked_routine(rewritten);
        assert_eq!(routine, worker);
        assert!(routine.is_wrapped());
    }

    struct Echo;

    impl Runner for Echo {
        fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>> {
            Box::pin(std::future::ready(Ok(effect.to_value())))
        }
    }

    #[tokio::test]
    async fn wrapped_routines_are_not_wrapped_again() {
        let ctx = MockContext::default();
        let child = Routine::new("child", |task: TaskContext, _| async move {
            task.put(json!({"type": "CHILD"})).await
        });
        let wrapped = ctx.intercept(&child, None);

        let rewritten = ctx.stubs().apply(&Effect::fork(&wrapped, vec![]), &ctx).unwrap();
        forked_routine(rewritten)
            .start(TaskContext::new(Arc::new(Echo)), vec![])
            .await
            .unwrap();

        assert_eq!(ctx.trace().len(), 1);
    }

    #[test]
    fn reset_keeps_interceptor() {
        let ctx = MockContext::default();
        ctx.stubs().register(Stub::func(EffectMatcher::call(&Func::declare("f")), Func::declare("g")));
        ctx.stubs().reset();
        assert!(ctx.stubs().snapshot().is_empty());

        let rewritten = ctx.stubs().apply(&Effect::fork(&idle("child"), vec![]), &ctx).unwrap();
        assert!(forked_routine(rewritten).is_wrapped());
    }

    #[test]
    fn stubs_chain_in_registration_order() {
        let ctx = MockContext::default();
        let (a, b, c) = (Func::declare("a"), Func::declare("b"), Func::declare("c"));
        ctx.stubs().register(Stub::func(EffectMatcher::call(&a), b.clone()));
        ctx.stubs().register(Stub::func(EffectMatcher::call(&b), c.clone()));

        let effect = Effect::all([Effect::call(&a, vec![json!(1)]), Effect::take("X")]);
        let rewritten = ctx.stubs().apply(&effect, &ctx).unwrap();
        assert_eq!(
            rewritten,
            Effect::all([Effect::call(&c, vec![json!(1)]), Effect::take("X")])
        );
    }

    #[test]
    fn failing_producer_aborts_apply() {
        let ctx = MockContext::default();
        ctx.stubs().register(Stub::with(
            EffectMatcher::take_action("X"),
            Arc::new(|_: &Effect| -> Result<Effect> { Err(Error::raised("nope")) }),
        ));
        let result = ctx.stubs().apply(&Effect::race([("x", Effect::take("X"))]), &ctx);
        assert_eq!(result, Err(Error::raised("nope")));
    }

    #[test]
    fn spawns_are_wrapped_but_keep_their_identity() {
        let ctx = MockContext::default();
        let child = idle("child");
        let rewritten = ctx
            .stubs()
            .apply(&Effect::fork(&child, vec![json!(1)]), &ctx)
            .unwrap();
        let Effect::Fork { routine, args } = rewritten else {
            panic!("expected fork");
        };
        assert_eq!(routine.name(), "child");
        assert_eq!(routine, child);
        assert!(routine.is_wrapped());
        assert!(!child.is_wrapped());
        assert_eq!(args, vec![json!(1)]);
    }
}
