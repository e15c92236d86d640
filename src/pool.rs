//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::events::EventChannel;
use crate::health::HealthStatus;
use crate::lock::{ExecutionContext, ReentrantLock};
use crate::logging::{LogLevel, Logger, TracingLogger};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of an object within the pool that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to an object managed by a [`ResourcePool`]
///
/// Clones refer to the same object. The pool keeps its own clone while the
/// object is active, so it can reclaim the object during a cascade release
/// even though callers still hold handles.
pub struct PooledObject<T> {
    id: ObjectId,
    value: Arc<T>,
}

impl<T> PooledObject<T> {
    fn new(id: ObjectId, value: T) -> Self {
        Self {
            id,
            value: Arc::new(value),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn same_object(&self, other: &PooledObject<T>) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Clone for PooledObject<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> PartialEq for PooledObject<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl<T: fmt::Debug> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("id", &self.id)
            .field("value", &*self.value)
            .finish()
    }
}

/// A pool that can hand back every object it has checked out
///
/// Child pools are stored behind this trait so a parent can cascade into
/// pools of any object type.
#[async_trait]
pub trait CascadeRelease: Send + Sync {
    /// Release every currently active object, returning how many were released
    async fn release_all(&self, context: &ExecutionContext) -> PoolResult<usize>;

    fn active_count(&self) -> usize;
}

type Factory<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;
type Reset<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct PoolState<T> {
    // stack: the most recently released object is reused first
    available: Vec<PooledObject<T>>,
    active: HashMap<ObjectId, PooledObject<T>>,
    // factory calls in flight that already hold an active slot
    reserved: usize,
    peak_active: usize,
}

/// Bounded pool of reusable objects
///
/// All mutations run under the pool's [`ReentrantLock`], owned by the
/// caller's [`ExecutionContext`]. The `acquired` and `released` events fire
/// while that lock is still held: handlers that call back into the pool with
/// the same context re-enter the lock, and may observe counts that are
/// already updated for the operation in flight.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{ExecutionContext, PoolConfiguration, ResourcePool};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = PoolConfiguration::new().with_min_size(2).with_max_size(3);
/// let pool = ResourcePool::with_config(
///     Vec::<u8>::with_capacity(64),
///     |template: &Vec<u8>| Vec::with_capacity(template.capacity()),
///     |_: &Vec<u8>| {},
///     config,
/// )
/// .unwrap();
/// let ctx = ExecutionContext::new();
///
/// let buffer = pool.acquire(&ctx).await.unwrap();
/// assert_eq!(pool.active_count(), 1);
/// assert_eq!(pool.available_count(), 1);
///
/// pool.release(&ctx, &buffer).await.unwrap();
/// assert_eq!(pool.active_count(), 0);
/// assert_eq!(pool.available_count(), 2);
/// # }
/// ```
pub struct ResourcePool<T: Send + Sync + 'static> {
    template: T,
    factory: Factory<T>,
    reset: Reset<T>,
    config: PoolConfiguration<T>,
    state: Mutex<PoolState<T>>,
    lock: ReentrantLock,
    children: DashMap<ObjectId, Arc<dyn CascadeRelease>>,
    acquired: EventChannel<PooledObject<T>>,
    released: EventChannel<PooledObject<T>>,
    metrics: MetricsTracker,
    logger: Arc<dyn Logger>,
    next_id: AtomicU64,
}

impl<T: Send + Sync + 'static> ResourcePool<T> {
    /// Create a pool with the default configuration (10 prewarmed, at most 50)
    pub fn create<F, R>(template: T, factory: F, reset: R) -> PoolResult<Self>
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
        R: Fn(&T) + Send + Sync + 'static,
    {
        Self::with_config(template, factory, reset, PoolConfiguration::default())
    }

    /// Create a pool that logs through `tracing`
    pub fn with_config<F, R>(
        template: T,
        factory: F,
        reset: R,
        config: PoolConfiguration<T>,
    ) -> PoolResult<Self>
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
        R: Fn(&T) + Send + Sync + 'static,
    {
        let logger = Arc::new(TracingLogger::new(config.name.clone()));
        Self::with_logger(template, factory, reset, config, logger)
    }

    /// Create a pool with an explicit logger
    ///
    /// Fails with [`PoolError::InvalidConfiguration`] when `max_size` is
    /// below `min_size`. The pool is prewarmed to `min_size` before returning.
    pub fn with_logger<F, R>(
        template: T,
        factory: F,
        reset: R,
        config: PoolConfiguration<T>,
        logger: Arc<dyn Logger>,
    ) -> PoolResult<Self>
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
        R: Fn(&T) + Send + Sync + 'static,
    {
        config.validate()?;

        let pool = Self {
            template,
            factory: Arc::new(factory),
            reset: Arc::new(reset),
            state: Mutex::new(PoolState {
                available: Vec::with_capacity(config.min_size),
                active: HashMap::new(),
                reserved: 0,
                peak_active: 0,
            }),
            config,
            lock: ReentrantLock::new(),
            children: DashMap::new(),
            acquired: EventChannel::new(),
            released: EventChannel::new(),
            metrics: MetricsTracker::new(),
            logger,
            next_id: AtomicU64::new(1),
        };

        // not yet shared, so the lock is not needed here
        pool.fill(pool.config.min_size);
        Ok(pool)
    }

    /// Create up to `count` objects and make them available
    ///
    /// The number added is clamped so that the available stack never exceeds
    /// `max_size`. Returns how many objects were created.
    pub async fn prewarm(&self, context: &ExecutionContext, count: usize) -> PoolResult<usize> {
        self.lock.acquire(context, self.config.lock_timeout).await?;
        let added = self.fill(count);
        self.lock.release(context)?;
        Ok(added)
    }

    fn fill(&self, count: usize) -> usize {
        self.logger
            .log(LogLevel::Info, &format!("Prewarming {} object(s)", count));

        let room = self
            .config
            .max_size
            .saturating_sub(self.state.lock().available.len());
        let batch: Vec<_> = (0..count.min(room)).map(|_| self.create_object()).collect();

        let (added, available, surplus) = {
            let mut state = self.state.lock();
            let room = self
                .config
                .max_size
                .saturating_sub(state.available.len());
            let mut batch = batch;
            let surplus = batch.split_off(room.min(batch.len()));
            let added = batch.len();
            state.available.extend(batch);
            (added, state.available.len(), surplus)
        };
        for object in &surplus {
            self.dispose(object);
        }

        self.logger.log(
            LogLevel::Info,
            &format!("Prewarm complete: {} added, {} available", added, available),
        );
        added
    }

    fn create_object(&self) -> PooledObject<T> {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let object = PooledObject::new(id, (self.factory)(&self.template));
        MetricsTracker::record(&self.metrics.total_created);
        self.logger
            .log(LogLevel::Info, &format!("Created object {}", id));
        object
    }

    /// Check out an object
    ///
    /// Reuses the most recently released object when one is available,
    /// otherwise creates one. Fails with [`PoolError::MaxPoolSizeExceeded`]
    /// without changing any state once `max_size` objects are active.
    pub async fn acquire(&self, context: &ExecutionContext) -> PoolResult<PooledObject<T>> {
        self.lock.acquire(context, self.config.lock_timeout).await?;

        let outcome = self.check_out();
        if let Ok(object) = &outcome {
            self.acquired.fire(object);
        }

        self.lock.release(context)?;
        outcome
    }

    fn check_out(&self) -> PoolResult<PooledObject<T>> {
        // the slot is claimed in the same critical section as the capacity check
        let reused = {
            let mut state = self.state.lock();
            if state.active.len() + state.reserved >= self.config.max_size {
                None
            } else {
                let popped = state.available.pop();
                if popped.is_none() {
                    state.reserved += 1;
                }
                Some(popped)
            }
        };

        let (object, created) = match reused {
            None => {
                let err = PoolError::MaxPoolSizeExceeded {
                    max_size: self.config.max_size,
                };
                MetricsTracker::record(&self.metrics.capacity_rejections);
                self.logger
                    .log(LogLevel::Warning, &format!("Acquire rejected: {}", err));
                return Err(err);
            }
            Some(Some(object)) => (object, false),
            Some(None) => (self.create_object(), true),
        };

        let (active, available) = {
            let mut state = self.state.lock();
            if created {
                state.reserved -= 1;
            }
            state.active.insert(object.id(), object.clone());
            state.peak_active = state.peak_active.max(state.active.len());
            (state.active.len(), state.available.len())
        };
        MetricsTracker::record(&self.metrics.total_acquired);

        self.logger.log(
            LogLevel::Info,
            &format!(
                "Acquired object {} (active: {}, available: {})",
                object.id(),
                active,
                available
            ),
        );
        Ok(object)
    }

    /// Return an object to the pool
    ///
    /// The object is reset and pushed onto the available stack, or disposed
    /// when the stack is already at `max_size`. Releasing an object that is
    /// not active is logged and otherwise ignored. If a child pool is
    /// registered under the object, all of that pool's active objects are
    /// released as part of this call, before the pool lock is given up.
    /// A child pool that cannot be released (for example because its lock
    /// timed out) is logged at error level; the parent release still succeeds.
    pub async fn release(
        &self,
        context: &ExecutionContext,
        object: &PooledObject<T>,
    ) -> PoolResult<()> {
        self.return_object(context, object).await.map(|_| ())
    }

    async fn return_object(
        &self,
        context: &ExecutionContext,
        object: &PooledObject<T>,
    ) -> PoolResult<bool> {
        self.lock.acquire(context, self.config.lock_timeout).await?;

        let returned = self.check_in(object);
        if let Some(object) = &returned {
            self.released.fire(object);
            self.cascade(context, object.id()).await;
        }

        self.lock.release(context)?;
        Ok(returned.is_some())
    }

    fn check_in(&self, object: &PooledObject<T>) -> Option<PooledObject<T>> {
        let removed = {
            let mut state = self.state.lock();
            let tracked = state
                .active
                .get(&object.id())
                .is_some_and(|tracked| tracked.same_object(object));
            if tracked {
                state.active.remove(&object.id())
            } else {
                None
            }
        };

        let Some(object) = removed else {
            MetricsTracker::record(&self.metrics.unknown_releases);
            let err = PoolError::ObjectNotActive(object.id());
            self.logger
                .log(LogLevel::Error, &format!("Release ignored: {}", err));
            return None;
        };

        (self.reset)(&object);

        let (kept, active, available) = {
            let mut state = self.state.lock();
            let kept = state.available.len() < self.config.max_size;
            if kept {
                state.available.push(object.clone());
            }
            (kept, state.active.len(), state.available.len())
        };

        if !kept {
            self.logger.log(
                LogLevel::Warning,
                &format!("Pool at capacity, disposing object {}", object.id()),
            );
            self.dispose(&object);
        }
        MetricsTracker::record(&self.metrics.total_released);

        self.logger.log(
            LogLevel::Info,
            &format!(
                "Released object {} (active: {}, available: {})",
                object.id(),
                active,
                available
            ),
        );
        Some(object)
    }

    fn dispose(&self, object: &PooledObject<T>) {
        MetricsTracker::record(&self.metrics.total_disposed);
        if let Some(hook) = self.config.on_dispose {
            hook(object);
        }
    }

    async fn cascade(&self, context: &ExecutionContext, parent: ObjectId) {
        let child = self
            .children
            .get(&parent)
            .map(|entry| Arc::clone(entry.value()));

        let Some(child) = child else {
            return;
        };

        match child.release_all(context).await {
            Ok(released) => self.logger.log(
                LogLevel::Info,
                &format!(
                    "Cascade released {} object(s) from child pool of {}",
                    released, parent
                ),
            ),
            Err(err) => self.logger.log(
                LogLevel::Error,
                &format!("Cascade from object {} failed: {}", parent, err),
            ),
        }
    }

    /// Release every active object, cascading into their child pools
    pub async fn release_all(&self, context: &ExecutionContext) -> PoolResult<usize> {
        self.lock.acquire(context, self.config.lock_timeout).await?;
        let mut snapshot: Vec<_> = self.state.lock().active.values().cloned().collect();
        self.lock.release(context)?;

        snapshot.sort_by_key(|object| object.id());

        let mut released = 0;
        for object in &snapshot {
            if self.return_object(context, object).await? {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Dispose of every available object, returning how many were dropped
    pub async fn drain(&self, context: &ExecutionContext) -> PoolResult<usize> {
        self.lock.acquire(context, self.config.lock_timeout).await?;

        let drained = std::mem::take(&mut self.state.lock().available);
        for object in &drained {
            self.dispose(object);
        }
        self.logger.log(
            LogLevel::Info,
            &format!("Drained {} available object(s)", drained.len()),
        );

        self.lock.release(context)?;
        Ok(drained.len())
    }

    /// Register `child` to be cascade-released whenever `parent` is released
    ///
    /// Returns the child pool previously registered under `parent`, if any.
    pub fn register_child(
        &self,
        parent: &PooledObject<T>,
        child: Arc<dyn CascadeRelease>,
    ) -> Option<Arc<dyn CascadeRelease>> {
        self.logger.log(
            LogLevel::Info,
            &format!("Registered child pool under object {}", parent.id()),
        );
        self.children.insert(parent.id(), child)
    }

    pub fn unregister_child(&self, parent: &PooledObject<T>) -> Option<Arc<dyn CascadeRelease>> {
        self.children.remove(&parent.id()).map(|(_, child)| child)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Whether this exact object is currently checked out of this pool
    pub fn is_active(&self, object: &PooledObject<T>) -> bool {
        self.state
            .lock()
            .active
            .get(&object.id())
            .is_some_and(|tracked| tracked.same_object(object))
    }

    /// Fired with each object handed out by [`acquire`](Self::acquire)
    pub fn acquired(&self) -> &EventChannel<PooledObject<T>> {
        &self.acquired
    }

    /// Fired with each object taken back by [`release`](Self::release)
    pub fn released(&self) -> &EventChannel<PooledObject<T>> {
        &self.released
    }

    pub fn lock(&self) -> &ReentrantLock {
        &self.lock
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn min_size(&self) -> usize {
        self.config.min_size
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn available_count(&self) -> usize {
        self.state.lock().available.len()
    }

    pub fn peak_active(&self) -> usize {
        self.state.lock().peak_active
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let (active, available, peak) = {
            let state = self.state.lock();
            (state.active.len(), state.available.len(), state.peak_active)
        };
        self.metrics.get_metrics(
            active,
            available,
            peak,
            self.config.min_size,
            self.config.max_size,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.get_metrics())
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> CascadeRelease for ResourcePool<T> {
    async fn release_all(&self, context: &ExecutionContext) -> PoolResult<usize> {
        ResourcePool::release_all(self, context).await
    }

    fn active_count(&self) -> usize {
        ResourcePool::active_count(self)
    }
}
