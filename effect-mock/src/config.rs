use std::time::Duration;

/// Harness configuration for mocked tasks.
///
/// Controls trace allocation and how long the settling helpers wait. Use the
/// builder methods to customize, or [`Default`] for sensible defaults.
///
/// # Examples
///
/// ```rust
/// use effect_mock::Config;
/// use std::time::Duration;
///
/// let config = Config::default()
///     .with_trace_capacity(256)                          // Long-running tasks
///     .with_settle_timeout(Duration::from_secs(5));      // Slow runners
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Initial capacity of each task's trace.
    /// Default: 64
    trace_capacity: usize,

    /// Poll interval while settling.
    /// Default: 1ms
    settle_window: Duration,

    /// Upper bound on how long [`settle`](crate::Mocked::settle) waits for
    /// deferred listeners.
    /// Default: 100ms
    max_settle: Duration,

    /// Default timeout for [`settle_on`](crate::Mocked::settle_on).
    /// Default: 1s
    settle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            trace_capacity: 64,
            settle_window: Duration::from_millis(1),
            max_settle: Duration::from_millis(100),
            settle_timeout: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Set the initial trace capacity.
    pub fn with_trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    /// Returns the initial trace capacity.
    pub fn trace_capacity(&self) -> usize {
        self.trace_capacity
    }

    /// Set the poll interval used while settling.
    ///
    /// Shorter windows react faster but spin more.
    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    /// Returns the settle poll interval.
    pub fn settle_window(&self) -> Duration {
        self.settle_window
    }

    /// Set the upper bound for [`settle`](crate::Mocked::settle).
    ///
    /// Listeners that keep spawning work are given up on after this long.
    pub fn with_max_settle(mut self, max: Duration) -> Self {
        self.max_settle = max;
        self
    }

    /// Returns the upper bound for `settle`.
    pub fn max_settle(&self) -> Duration {
        self.max_settle
    }

    /// Set the default timeout for condition-based settling.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Returns the default timeout for condition-based settling.
    pub fn settle_timeout(&self) -> Duration {
        self.settle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = Config::default()
            .with_trace_capacity(8)
            .with_settle_window(Duration::from_millis(5))
            .with_max_settle(Duration::from_millis(50))
            .with_settle_timeout(Duration::from_secs(3));
        assert_eq!(config.trace_capacity(), 8);
        assert_eq!(config.settle_window(), Duration::from_millis(5));
        assert_eq!(config.max_settle(), Duration::from_millis(50));
        assert_eq!(config.settle_timeout(), Duration::from_secs(3));
        assert_ne!(config, Config::default());
    }
}
