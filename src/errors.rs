//! Error types for the resource pool and its lock

use crate::pool::ObjectId;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`ReentrantLock`](crate::ReentrantLock)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Lock was not acquired within {0:?}")]
    Timeout(Duration),

    #[error("Lock is not held by the calling context")]
    NotOwner,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool lock was not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Pool lock released by a context that does not own it")]
    NotOwner,

    #[error("Maximum pool size of {max_size} active objects exceeded")]
    MaxPoolSizeExceeded { max_size: usize },

    /// Only ever logged; `release` degrades to a no-op instead of failing.
    #[error("Object {0} is not active in this pool")]
    ObjectNotActive(ObjectId),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<LockError> for PoolError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout(after) => PoolError::LockTimeout(after),
            LockError::NotOwner => PoolError::NotOwner,
        }
    }
}

pub type LockResult<T> = Result<T, LockError>;

pub type PoolResult<T> = Result<T, PoolError>;
