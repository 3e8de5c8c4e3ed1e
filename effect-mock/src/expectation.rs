use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    time::Duration,
};

use tokio::time::Instant;

use crate::{Config, Error, MockContext, Mocked, Query, Result};

/// A condition-based settle builder.
///
/// Created by [`Mocked::settle_on`]. Waits for pending listeners, then
/// checks the condition against a live [`Query`] every settle window until
/// it holds. If the timeout expires first, returns
/// [`Error::SettleTimeout`].
///
/// # Example
///
/// ```ignore
/// // Wait until the task has dispatched three ticks
/// mock.settle_on(|q| q.put_action(json!({"type": "TICK"})).count() >= 3).await?;
///
/// // With a custom timeout
/// mock.settle_on(|q| q.call(&save).is_present())
///     .within(Duration::from_secs(3))
///     .await?;
/// ```
pub struct Expectation<'a, M, F> {
    mock: &'a M,
    condition: F,
    timeout: Duration,
}

impl<'a, M, F> Expectation<'a, M, F>
where
    M: Mocked,
    F: Fn(Query) -> bool,
{
    pub(crate) fn new(mock: &'a M, condition: F) -> Self {
        let timeout = config_of(&mock.contexts()).settle_timeout();
        Self {
            mock,
            condition,
            timeout,
        }
    }

    /// Override the configured timeout.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(self) -> Result {
        let contexts: Vec<MockContext> = self.mock.contexts().into_iter().cloned().collect();
        let window = config_of(&self.mock.contexts()).settle_window();
        let deadline = Instant::now() + self.timeout;

        settle_contexts(&contexts).await;

        loop {
            if (self.condition)(self.mock.query()) {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::SettleTimeout(self.timeout, self.mock.effect_count()));
            }
            tokio::time::sleep(window.min(remaining)).await;
        }
    }
}

impl<'a, M, F> IntoFuture for Expectation<'a, M, F>
where
    M: Mocked,
    F: Fn(Query) -> bool + 'a,
{
    type Output = Result;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

impl<M: fmt::Debug, F> fmt::Debug for Expectation<'_, M, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("mock", &self.mock)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn config_of(contexts: &[&MockContext]) -> Config {
    contexts
        .first()
        .map(|ctx| ctx.config().clone())
        .unwrap_or_default()
}

/// Wait until every listener batch scheduled on the contexts has run, or
/// until the configured `max_settle` elapses.
pub(crate) async fn settle_contexts(contexts: &[MockContext]) {
    let refs: Vec<&MockContext> = contexts.iter().collect();
    let config = config_of(&refs);
    let deadline = Instant::now() + config.max_settle();

    loop {
        // Spawned listener batches only run once this task yields.
        tokio::task::yield_now().await;
        let pending: usize = contexts.iter().map(|c| c.pending().count()).sum();
        if pending == 0 {
            return;
        }
        if Instant::now() >= deadline {
            tracing::warn!(pending, max_settle = ?config.max_settle(), "Listeners still pending after settle");
            return;
        }
        tokio::time::sleep(config.settle_window()).await;
    }
}
