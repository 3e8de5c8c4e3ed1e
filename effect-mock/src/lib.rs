#![cfg_attr(docsrs, feature(doc_cfg))]
//! # effect-mock
//!
//! Record, stub and query the effects emitted by suspend/resume tasks.
//!
//! Tasks written against a [`TaskContext`] never act directly: they describe
//! what they want done as an [`Effect`] (dispatch a message, wait for one,
//! call a function, spawn a subtask, run several effects in parallel or race
//! them) and suspend until a [`Runner`] reports back. effect-mock places a
//! driver between the task and its runner that records every effect,
//! notifies listeners, and optionally rewrites effects before forwarding
//! them. Tests assert on what a task *intended* to do and control what
//! actually happens, without a live environment.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use effect_mock::*;
//! use serde_json::json;
//!
//! let charge = Func::declare("payments.charge");
//! let checkout = Routine::new("checkout", move |ctx: TaskContext, args| {
//!     let charge = charge.clone();
//!     async move {
//!         ctx.take("CHECKOUT").await?;
//!         match ctx.call(&charge, args).await {
//!             Ok(receipt) => ctx.put(json!({"type": "PAID", "receipt": receipt})).await,
//!             Err(_) => ctx.put(json!({"type": "DECLINED"})).await,
//!         }
//!     }
//! });
//!
//! let mock = mock(checkout.with_args(vec![json!(42)]))?;
//! mock.stub_call(&charge, &Func::sync("fake_charge", |_| Err(Error::raised("card expired"))))?;
//!
//! // run `mock.as_task().unwrap().run(runner)` against your runner, then:
//! assert!(mock.query().put_action(json!({"type": "DECLINED"})).is_present());
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Effect`] | Description of an action a task wants performed |
//! | [`Routine`] / [`Task`] | A task body, unbound or with its arguments |
//! | [`Runner`] | The component that actually carries out effects |
//! | [`Mocked`] | Listener, stub and query surface of a mocked task or group |
//! | [`MockTask`] / [`MockGroup`] | One mocked task, or several side by side |
//! | [`EffectMatcher`] | Selects effects, including inside `All` and `Race` |
//! | [`Query`] / [`QueryResult`] | Positional queries over the recorded trace |
//!
//! ## Nested effects
//!
//! Matching looks inside parallel and race composites at any depth: a query
//! for a call finds it even when the task emitted it inside a race of
//! parallel groups. Stubs rewrite nested effects in place and keep the
//! surrounding structure. Spawned tasks are wrapped automatically, so their
//! effects land in the parent's trace.
//!
//! ## Features
//!
//! - **`serde`** - `Serialize`/`Deserialize` for [`Config`], [`EffectKind`] and [`DriverState`]

mod config;
mod context;
mod driver;
mod effect;
mod error;
mod expectation;
mod func;
mod listener;
mod matcher;
mod mock;
mod mock_context;
mod mock_group;
mod mock_task;
mod mocked;
mod pattern;
mod query;
mod routine;
mod runner;
mod stub;
mod trace;
mod value_match;

pub mod recursive;

use std::{future::Future, pin::Pin};

pub use config::Config;
pub use context::TaskContext;
pub use driver::{Driver, DriverState, StepOutcome};
pub use effect::{EFFECT_MARKER, Effect, EffectKind, classify};
pub use error::Error;
pub use expectation::Expectation;
pub use func::Func;
pub use listener::Listener;
pub use matcher::EffectMatcher;
pub use mock::Mock;
pub use mock_context::MockContext;
pub use mock_group::MockGroup;
pub use mock_task::MockTask;
pub use mocked::Mocked;
pub use pattern::Pattern;
pub use query::{Query, QueryResult};
pub use routine::{Routine, Task, TaskSpec};
pub use runner::Runner;
pub use stub::Stub;
pub use trace::Trace;
pub use value_match::is_match;

/// Convenience alias for `Result<T, effect_mock::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;

/// A boxed, sendable future, as passed across the runner boundary.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Mock a task, a routine, or a group of either.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a group nested inside a group.
pub fn mock(spec: impl Into<TaskSpec>) -> Result<Mock> {
    mock_with_config(spec, Config::default())
}

/// Like [`mock`], with a custom [`Config`].
pub fn mock_with_config(spec: impl Into<TaskSpec>, config: Config) -> Result<Mock> {
    Mock::build(spec.into(), config)
}
