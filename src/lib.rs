//! # EsoxSolutions.ResourcePool
//!
//! Bounded, concurrency-safe reuse of expensive objects for tight loops,
//! with observable metrics and hierarchical cascade release.
//!
//! ## Features
//!
//! - Stack-ordered reuse: the most recently released object is handed out next
//! - Hard capacity limit with `MaxPoolSizeExceeded` on acquire
//! - Overflow disposal on release once the available stack is full
//! - Reentrant cooperative lock owned by an explicit execution context,
//!   with FIFO hand-over and optional timeout
//! - `acquired` / `released` event channels with persistent, one-shot,
//!   wait-for-next and throttled subscriptions
//! - Child pools registered per object and released in cascade
//! - Metrics, Prometheus export and health assessment
//! - Pluggable logging, forwarded to `tracing` by default
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{ExecutionContext, PoolConfiguration, ResourcePool};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = ResourcePool::with_config(
//!     String::with_capacity(128),
//!     |template: &String| String::with_capacity(template.capacity()),
//!     |_: &String| {},
//!     PoolConfiguration::new().with_min_size(2).with_max_size(8),
//! )
//! .unwrap();
//!
//! let ctx = ExecutionContext::new();
//! let obj = pool.acquire(&ctx).await.unwrap();
//! println!("Got object {}", obj.id());
//! pool.release(&ctx, &obj).await.unwrap();
//! assert_eq!(pool.available_count(), 2);
//! # }
//! ```

mod pool;
mod config;
mod events;
mod lock;
mod logging;
mod metrics;
mod health;
mod errors;

pub use pool::{CascadeRelease, ObjectId, PooledObject, ResourcePool};
pub use config::PoolConfiguration;
pub use events::{EventChannel, NextFire, Subscription};
pub use lock::{ExecutionContext, ReentrantLock};
pub use logging::{LogLevel, LogRecord, Logger, MemoryLogger, TracingLogger};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use health::HealthStatus;
pub use errors::{LockError, LockResult, PoolError, PoolResult};
