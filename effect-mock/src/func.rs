use std::{fmt, future::Future, sync::Arc};

use serde_json::Value;

use crate::{BoxFuture, Error, Result};

type FuncBody = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A reference to a function that a task asks its runner to invoke.
///
/// `Func` is the payload of [`Effect::Call`](crate::Effect::Call). Two
/// references are equal when they share the same body (clones of one
/// `Func` are equal; two `Func::new` calls with identical closures are
/// not). References created with [`declare`](Self::declare) have no body:
/// they name an operation the runner resolves on its own, and compare
/// by name.
///
/// # Example
///
/// ```rust
/// use effect_mock::Func;
/// use serde_json::json;
///
/// let fetch_user = Func::new("fetch_user", |args| async move {
///     Ok(json!({"id": args[0], "name": "Ada"}))
/// });
///
/// assert_eq!(fetch_user, fetch_user.clone());
/// assert_eq!(fetch_user.name(), "fetch_user");
/// ```
#[derive(Clone)]
pub struct Func {
    name: Arc<str>,
    body: Option<FuncBody>,
}

impl Func {
    /// Create a function reference with an async body.
    pub fn new<F, Fut>(name: &str, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: Arc::from(name),
            body: Some(Arc::new(
                move |args| -> BoxFuture<'static, Result<Value>> { Box::pin(body(args)) },
            )),
        }
    }

    /// Create a function reference with a synchronous body.
    pub fn sync<F>(name: &str, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, move |args| std::future::ready(body(args)))
    }

    /// Name an operation without providing a body.
    ///
    /// The harness can match and record calls to declared functions, but
    /// cannot invoke them: that is up to the runner.
    pub fn declare(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            body: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this reference carries a body the harness can invoke.
    #[inline]
    pub fn is_callable(&self) -> bool {
        self.body.is_some()
    }

    /// Invoke the body with the given arguments.
    ///
    /// # Errors
    ///
    /// The returned future yields [`Error::NotCallable`] for declared
    /// functions, or whatever the body itself returns.
    pub fn invoke(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        match &self.body {
            Some(body) => body(args),
            None => {
                let name = self.name.to_string();
                Box::pin(async move { Err(Error::NotCallable(name)) })
            }
        }
    }
}

impl PartialEq for Func {
    fn eq(&self, other: &Self) -> bool {
        match (&self.body, &other.body) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => self.name == other.name,
            _ => false,
        }
    }
}

impl Eq for Func {}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_callable() {
            write!(f, "Func({})", self.name)
        } else {
            write!(f, "Func({}, declared)", self.name)
        }
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
