//! Reentrant cooperative lock keyed by an explicit execution context
//!
//! Ownership is tracked by an [`ExecutionContext`] token rather than by
//! thread or task identity. Contended callers park in a FIFO queue and the
//! releasing owner hands the lock directly to the oldest live waiter.

use crate::errors::{LockError, LockResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical task for lock ownership
///
/// Every call to [`ExecutionContext::new`] yields a distinct token. Copies of
/// a token are the same owner, so work that shares a token may re-enter a lock
/// it already holds.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ExecutionContext;
///
/// let a = ExecutionContext::new();
/// let b = ExecutionContext::new();
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionContext(u64);

impl ExecutionContext {
    pub fn new() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

struct Waiter {
    ticket: u64,
    context: ExecutionContext,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct LockState {
    owner: Option<ExecutionContext>,
    depth: usize,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
}

impl LockState {
    fn try_enter(&mut self, context: ExecutionContext) -> bool {
        match self.owner {
            None => {
                self.owner = Some(context);
                self.depth = 1;
                true
            }
            Some(owner) if owner == context => {
                self.depth += 1;
                true
            }
            Some(_) => false,
        }
    }

    fn leave(&mut self, context: ExecutionContext) -> LockResult<()> {
        if self.owner != Some(context) {
            return Err(LockError::NotOwner);
        }

        self.depth -= 1;
        if self.depth == 0 {
            self.owner = None;
            self.hand_off();
        }
        Ok(())
    }

    fn hand_off(&mut self) {
        while let Some(waiter) = self.waiters.pop_front() {
            self.owner = Some(waiter.context);
            self.depth = 1;
            if waiter.wake.send(()).is_ok() {
                return;
            }
            // receiver went away without dequeuing itself
            self.owner = None;
            self.depth = 0;
        }
    }

    fn dequeue(&mut self, ticket: u64) -> bool {
        match self.waiters.iter().position(|w| w.ticket == ticket) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Reentrant mutual-exclusion primitive with optional acquire timeout
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{ExecutionContext, ReentrantLock};
///
/// # #[tokio::main]
/// # async fn main() {
/// let lock = ReentrantLock::new();
/// let ctx = ExecutionContext::new();
///
/// lock.acquire(&ctx, None).await.unwrap();
/// lock.acquire(&ctx, None).await.unwrap();
/// assert_eq!(lock.depth(), 2);
///
/// lock.release(&ctx).unwrap();
/// lock.release(&ctx).unwrap();
/// assert!(!lock.is_held());
/// # }
/// ```
pub struct ReentrantLock {
    state: Mutex<LockState>,
}

impl ReentrantLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
        }
    }

    /// Acquire the lock for `context`, waiting at most `timeout` when contended
    ///
    /// Returns immediately when the lock is free or already owned by
    /// `context`. On timeout the waiter is withdrawn and nothing else changes.
    pub async fn acquire(
        &self,
        context: &ExecutionContext,
        timeout: Option<Duration>,
    ) -> LockResult<()> {
        let (ticket, receiver) = {
            let mut state = self.state.lock();
            if state.try_enter(*context) {
                return Ok(());
            }

            let (wake, receiver) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(Waiter {
                ticket,
                context: *context,
                wake,
            });
            (ticket, receiver)
        };

        tracing::trace!(context = context.id(), ticket, "lock contended, waiting");

        let mut pending = PendingAcquire {
            lock: self,
            ticket,
            receiver,
            settled: false,
        };

        let woken = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut pending.receiver)
                .await
                .ok(),
            None => Some((&mut pending.receiver).await),
        };

        if let Some(Ok(())) = woken {
            pending.settled = true;
            return Ok(());
        }

        pending.settled = true;
        let mut state = self.state.lock();
        if state.dequeue(ticket) {
            let limit = timeout.unwrap_or_default();
            tracing::debug!(context = context.id(), ?limit, "lock acquire timed out");
            Err(LockError::Timeout(limit))
        } else {
            // handed over while the deadline expired
            Ok(())
        }
    }

    /// Acquire without waiting; fails with a zero timeout when contended
    pub fn try_acquire(&self, context: &ExecutionContext) -> LockResult<()> {
        if self.state.lock().try_enter(*context) {
            Ok(())
        } else {
            Err(LockError::Timeout(Duration::ZERO))
        }
    }

    /// Undo one level of acquisition held by `context`
    pub fn release(&self, context: &ExecutionContext) -> LockResult<()> {
        self.state.lock().leave(*context)
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Current nesting depth; zero when unheld
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    pub fn owner(&self) -> Option<ExecutionContext> {
        self.state.lock().owner
    }

    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue entry that withdraws itself if the acquire future is dropped early
struct PendingAcquire<'a> {
    lock: &'a ReentrantLock,
    ticket: u64,
    receiver: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut state = self.lock.state.lock();
        if !state.dequeue(self.ticket) {
            // ownership arrived after the caller stopped listening
            if let Some(owner) = state.owner {
                let _ = state.leave(owner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn wait_for_waiters(lock: &ReentrantLock, count: usize) {
        while lock.waiter_count() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_reentrant_acquire_and_release() {
        let lock = ReentrantLock::new();
        let ctx = ExecutionContext::new();

        for _ in 0..3 {
            lock.acquire(&ctx, None).await.unwrap();
        }
        assert_eq!(lock.depth(), 3);
        assert_eq!(lock.owner(), Some(ctx));

        for _ in 0..3 {
            lock.release(&ctx).unwrap();
        }
        assert!(!lock.is_held());
        assert_eq!(lock.release(&ctx), Err(LockError::NotOwner));
    }

    #[tokio::test]
    async fn test_release_by_other_context_fails() {
        let lock = ReentrantLock::new();
        let owner = ExecutionContext::new();
        let intruder = ExecutionContext::new();

        assert_eq!(lock.release(&intruder), Err(LockError::NotOwner));

        lock.acquire(&owner, None).await.unwrap();
        assert_eq!(lock.release(&intruder), Err(LockError::NotOwner));
        assert_eq!(lock.depth(), 1);
        assert_eq!(lock.owner(), Some(owner));
    }

    #[tokio::test]
    async fn test_timeout_leaves_state_untouched() {
        let lock = ReentrantLock::new();
        let owner = ExecutionContext::new();
        let other = ExecutionContext::new();

        lock.acquire(&owner, None).await.unwrap();
        let result = lock.acquire(&other, Some(Duration::from_millis(20))).await;

        assert_eq!(result, Err(LockError::Timeout(Duration::from_millis(20))));
        assert_eq!(lock.owner(), Some(owner));
        assert_eq!(lock.depth(), 1);
        assert_eq!(lock.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_contended_acquire_is_handed_over() {
        let lock = Arc::new(ReentrantLock::new());
        let owner = ExecutionContext::new();
        let other = ExecutionContext::new();

        lock.acquire(&owner, None).await.unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                lock.acquire(&other, None).await.unwrap();
                lock.owner()
            })
        };

        wait_for_waiters(&lock, 1).await;
        lock.release(&owner).unwrap();

        assert_eq!(waiter.await.unwrap(), Some(other));
        assert_eq!(lock.depth(), 1);
    }

    #[tokio::test]
    async fn test_waiters_are_woken_in_fifo_order() {
        let lock = Arc::new(ReentrantLock::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let owner = ExecutionContext::new();

        lock.acquire(&owner, None).await.unwrap();

        let mut handles = Vec::new();
        for label in ["first", "second", "third"] {
            let lock_clone = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let ctx = ExecutionContext::new();
                lock_clone.acquire(&ctx, None).await.unwrap();
                order.lock().push(label);
                lock_clone.release(&ctx).unwrap();
            }));
            wait_for_waiters(&lock, handles.len()).await;
        }

        lock.release(&owner).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_dropped_acquire_withdraws_waiter() {
        let lock = ReentrantLock::new();
        let owner = ExecutionContext::new();
        let other = ExecutionContext::new();

        lock.acquire(&owner, None).await.unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), lock.acquire(&other, None)).await;
        assert!(abandoned.is_err());
        assert_eq!(lock.waiter_count(), 0);

        lock.release(&owner).unwrap();
        assert!(!lock.is_held());
    }

    #[test]
    fn test_try_acquire() {
        let lock = ReentrantLock::new();
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();

        assert!(lock.try_acquire(&a).is_ok());
        assert!(lock.try_acquire(&a).is_ok());
        assert_eq!(lock.try_acquire(&b), Err(LockError::Timeout(Duration::ZERO)));
        assert_eq!(lock.depth(), 2);
    }
}
