//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<Vec<u8>>::new()
///     .with_min_size(2)
///     .with_max_size(8)
///     .with_lock_timeout(Duration::from_millis(250))
///     .with_name("buffers");
///
/// assert_eq!(config.min_size, 2);
/// assert_eq!(config.max_size, 8);
/// assert_eq!(config.lock_timeout, Some(Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration<T> {
    /// Number of objects created eagerly when the pool is constructed
    pub min_size: usize,

    /// Upper bound for both active and available objects
    pub max_size: usize,

    /// Deadline for taking the pool lock; `None` waits indefinitely
    pub lock_timeout: Option<Duration>,

    /// Name used in log records and exported metrics
    pub name: String,

    /// Called when an object is discarded instead of being kept for reuse
    pub on_dispose: Option<fn(&T)>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 50,
            lock_timeout: None,
            name: "pool".to_string(),
            on_dispose: None,
        }
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of objects to prewarm on creation
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<i32>::new()
    ///     .with_max_size(3);
    ///
    /// assert_eq!(config.max_size, 3);
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Install a hook that receives objects dropped at capacity or drained
    pub fn with_dispose_hook(mut self, hook: fn(&T)) -> Self {
        self.on_dispose = Some(hook);
        self
    }

    /// Reject configurations whose capacity bounds contradict each other
    pub(crate) fn validate(&self) -> PoolResult<()> {
        if self.max_size < self.min_size {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_size ({}) must be at least min_size ({})",
                self.max_size, self.min_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::<u8>::default();
        assert_eq!(config.min_size, 10);
        assert_eq!(config.max_size, 50);
        assert!(config.lock_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_above_max_rejected() {
        let config = PoolConfiguration::<u8>::new().with_min_size(5).with_max_size(4);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_sized_pool_is_valid() {
        let config = PoolConfiguration::<u8>::new().with_min_size(0).with_max_size(0);
        assert!(config.validate().is_ok());
    }
}
