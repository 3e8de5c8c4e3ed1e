use std::{future::Future, sync::Arc};

use serde_json::Value;

use crate::{
    Effect, EffectMatcher, Error, Expectation, Func, MockContext, Pattern, Query, Result,
    expectation::settle_contexts,
    listener::{Callback, Listener},
    stub::{Producer, Stub},
};

/// The configuration and query surface shared by mocked tasks and groups.
///
/// Configuration methods return `&Self` so calls chain:
///
/// ```ignore
/// mock.on_take_action("START", move |_| started.store(true, Ordering::SeqCst))
///     .stub_call(&api.fetch, &fake_fetch)?
///     .on_put_action(json!({"type": "DONE"}), move |_| done.notify_one());
/// ```
///
/// On a group, every configuration call applies to each task in the group
/// and every query concatenates the per-task results.
///
/// Listeners receive the effect as the task emitted it, before any stub
/// rewrote it. They never run inline: each batch is spawned on the Tokio
/// runtime and runs once the emitting task yields. Use
/// [`settle`](Self::settle) to wait for them.
pub trait Mocked {
    /// The shared state of every task behind this handle, in task order.
    fn contexts(&self) -> Vec<&MockContext>;

    // ==================== Listeners ====================

    /// Call `callback` for every effect deep-equal to `effect`.
    fn on_effect<C>(&self, effect: Effect, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        self.on_matching(EffectMatcher::by_effect(effect), callback)
    }

    /// Call `callback` whenever the task waits on an equal pattern.
    fn on_take_action<C>(&self, pattern: impl Into<Pattern>, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        self.on_matching(EffectMatcher::take_action(pattern), callback)
    }

    /// Call `callback` whenever the task dispatches a message containing
    /// the given fields.
    fn on_put_action<C>(&self, message: Value, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        self.on_matching(EffectMatcher::put_action(message), callback)
    }

    fn on_call<C>(&self, func: &Func, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        self.on_matching(EffectMatcher::call(func), callback)
    }

    fn on_call_with_args<C>(&self, func: &Func, args: Vec<Value>, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        self.on_matching(EffectMatcher::call_with_args(func, args), callback)
    }

    fn on_call_with_exact_args<C>(&self, func: &Func, args: Vec<Value>, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        self.on_matching(EffectMatcher::call_with_exact_args(func, args), callback)
    }

    /// Call `callback` for every effect the matcher selects, looking inside
    /// composites.
    fn on_matching<C>(&self, matcher: impl Into<EffectMatcher>, callback: C) -> &Self
    where
        Self: Sized,
        C: Fn(&Effect) + Send + Sync + 'static,
    {
        let matcher = matcher.into();
        let callback: Callback = Arc::new(callback);
        for ctx in self.contexts() {
            ctx.listeners()
                .register(Listener::new(matcher.clone(), callback.clone()));
        }
        self
    }

    // ==================== Stubs ====================

    /// Invoke `replacement` instead of `func`, with the same arguments.
    ///
    /// Registering again for the same function swaps the replacement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStub`] if `replacement` was
    /// [declared](Func::declare) without a body.
    fn stub_call(&self, func: &Func, replacement: &Func) -> Result<&Self>
    where
        Self: Sized,
    {
        register_func_stub(self, EffectMatcher::call(func), replacement)?;
        Ok(self)
    }

    /// Like [`stub_call`](Self::stub_call), for invocations whose leading
    /// arguments match `args`.
    fn stub_call_with_args(&self, func: &Func, args: Vec<Value>, replacement: &Func) -> Result<&Self>
    where
        Self: Sized,
    {
        register_func_stub(self, EffectMatcher::call_with_args(func, args), replacement)?;
        Ok(self)
    }

    /// Like [`stub_call`](Self::stub_call), for invocations with exactly
    /// `args`.
    fn stub_call_with_exact_args(
        &self,
        func: &Func,
        args: Vec<Value>,
        replacement: &Func,
    ) -> Result<&Self>
    where
        Self: Sized,
    {
        register_func_stub(
            self,
            EffectMatcher::call_with_exact_args(func, args),
            replacement,
        )?;
        Ok(self)
    }

    /// Replace every effect the matcher selects with `producer`'s output.
    ///
    /// The producer receives the matched effect and returns its full
    /// substitute. An `Err` from the producer is delivered to the task at
    /// the point where it emitted the effect; the runner never sees it.
    fn stub_matching<P>(&self, matcher: impl Into<EffectMatcher>, producer: P) -> &Self
    where
        Self: Sized,
        P: Fn(&Effect) -> Result<Effect> + Send + Sync + 'static,
    {
        let matcher = matcher.into();
        let producer: Producer = Arc::new(producer);
        for ctx in self.contexts() {
            ctx.stubs().register(Stub::with(matcher.clone(), producer.clone()));
        }
        self
    }

    /// Drop every stub. Spawned tasks keep being recorded.
    fn reset_stubs(&self) -> &Self
    where
        Self: Sized,
    {
        for ctx in self.contexts() {
            ctx.stubs().reset();
        }
        self
    }

    /// Forget every recorded effect.
    fn clear_stored_effects(&self) -> &Self
    where
        Self: Sized,
    {
        for ctx in self.contexts() {
            ctx.trace().clear();
        }
        self
    }

    // ==================== Queries ====================

    /// Start a query over everything recorded so far.
    fn query(&self) -> Query {
        Query::new(self.contexts().into_iter().map(|ctx| ctx.trace().clone()))
    }

    /// Every recorded effect, concatenated in task order.
    fn effects(&self) -> Vec<Effect> {
        self.contexts()
            .into_iter()
            .flat_map(|ctx| ctx.trace().snapshot())
            .collect()
    }

    fn effect_count(&self) -> usize {
        self.contexts()
            .into_iter()
            .map(|ctx| ctx.trace().len())
            .sum()
    }

    // ==================== Settling ====================

    /// Wait until every scheduled listener has run.
    ///
    /// Gives up after the configured
    /// [`max_settle`](crate::Config::max_settle).
    fn settle(&self) -> impl Future<Output = ()> + Send
    where
        Self: Sized,
    {
        let contexts: Vec<MockContext> = self.contexts().into_iter().cloned().collect();
        async move { settle_contexts(&contexts).await }
    }

    /// Wait until `condition` holds for the recorded effects.
    ///
    /// Fails with [`Error::SettleTimeout`] after the configured
    /// [`settle_timeout`](crate::Config::settle_timeout), or the duration
    /// given to [`Expectation::within`].
    fn settle_on<F>(&self, condition: F) -> Expectation<'_, Self, F>
    where
        Self: Sized,
        F: Fn(Query) -> bool,
    {
        Expectation::new(self, condition)
    }

    /// Wait until an effect the matcher selects has been recorded.
    fn settle_on_effect<M>(&self, matcher: M) -> Expectation<'_, Self, impl Fn(Query) -> bool>
    where
        Self: Sized,
        M: Into<EffectMatcher>,
    {
        let matcher = matcher.into();
        self.settle_on(move |query| query.matching(matcher.clone()).is_present())
    }

    // ==================== Debugging ====================

    /// Print every recorded effect.
    fn dump(&self) {
        let contexts = self.contexts();
        if contexts.iter().all(|ctx| ctx.trace().is_empty()) {
            println!("(no effects recorded)");
            return;
        }
        for (task, ctx) in contexts.iter().enumerate() {
            let effects = ctx.trace().snapshot();
            println!("Task {task}: {} effects", effects.len());
            for (i, effect) in effects.iter().enumerate() {
                println!("  {i}: {effect}");
            }
        }
    }

    /// The recorded effects in wire form, one array per task.
    fn to_json(&self) -> Result<String> {
        let traces: Vec<Value> = self
            .contexts()
            .into_iter()
            .map(|ctx| Value::Array(ctx.trace().snapshot().iter().map(Effect::to_value).collect()))
            .collect();
        Ok(serde_json::to_string_pretty(&traces)?)
    }
}

fn register_func_stub<M: Mocked>(mock: &M, matcher: EffectMatcher, replacement: &Func) -> Result {
    if !replacement.is_callable() {
        let target = matcher.func().map_or(replacement.name(), Func::name);
        return Err(Error::InvalidStub(target.to_string()));
    }
    for ctx in mock.contexts() {
        ctx.stubs()
            .register(Stub::func(matcher.clone(), replacement.clone()));
    }
    Ok(())
}
