use serde_json::Value;

use crate::{BoxFuture, Effect, Result};

/// The component that actually carries out effects.
///
/// A runner receives every effect a task emits and eventually resolves it
/// with a value or a failure. It owns the effect vocabulary's semantics:
/// where a `Put` goes, when a `Take` resumes, how `All` and `Race` settle,
/// and how a `Fork`ed routine is scheduled. For forks it is expected to start
/// the routine with a [`TaskContext`](crate::TaskContext) over itself, so that
/// the nested task's effects come back through the same runner.
///
/// The harness places a [`Driver`](crate::Driver) in front of the real
/// runner; the driver implements `Runner` too, so neither the task nor the
/// real runner can tell the difference.
///
/// Implementations must resolve effects of one task in the order they were
/// forwarded and must start any work eagerly enough that a `Take` is
/// listening by the time its future is first polled.
pub trait Runner: Send + Sync + 'static {
    /// Carry out the effect, resolving with its result.
    fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>>;
}
