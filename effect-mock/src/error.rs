use std::{sync::Arc, time::Duration};

/// The single error type for all effect-mock operations.
///
/// Every fallible API returns `effect_mock::Result<T>` (alias for
/// `Result<T, effect_mock::Error>`). The same type travels through the
/// runner boundary: a task resumed with a failure observes it as an
/// `Err(Error)` at the point where it suspended.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Invalid task specification: {0}")]
    InvalidInput(String),

    #[error("Invalid stub for '{0}': the replacement has no body to invoke")]
    InvalidStub(String),

    #[error("Function '{0}' was declared without a body")]
    NotCallable(String),

    #[error("{0}")]
    Raised(String),

    #[error("External error: {0}")]
    External(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("settle_on condition not met within {0:?}: {1} effects recorded")]
    SettleTimeout(Duration, usize),
}

impl Error {
    /// A failure raised by task code, an effect, or a stub.
    pub fn raised(message: impl Into<String>) -> Self {
        Error::Raised(message.into())
    }

    pub fn external(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::External(Arc::new(e))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidStub(a), Self::InvalidStub(b)) => a == b,
            (Self::NotCallable(a), Self::NotCallable(b)) => a == b,
            (Self::Raised(a), Self::Raised(b)) => a == b,
            (Self::External(a), Self::External(b)) => Arc::ptr_eq(a, b),
            (Self::SettleTimeout(a1, a2), Self::SettleTimeout(b1, b2)) => a1 == b1 && a2 == b2,
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::External(Arc::new(e))
    }
}
