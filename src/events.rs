//! Multicast event channel used for pool notifications
//!
//! Handlers run synchronously on the caller of [`EventChannel::fire`].
//! Subscriptions are stored in ordered maps keyed by a monotonically
//! increasing id and are removed as soon as they are disposed, so churn
//! never accumulates dead entries.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Persistent,
    Once,
}

struct Registry<A> {
    persistent: BTreeMap<u64, Handler<A>>,
    once: BTreeMap<u64, Handler<A>>,
    next_id: u64,
}

struct ChannelInner<A> {
    registry: Mutex<Registry<A>>,
    // subscriptions this channel holds on the channel it was derived from
    upstream: Mutex<Vec<Subscription>>,
}

trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, kind: SubscriptionKind, id: u64) -> bool;
    fn is_subscribed(&self, kind: SubscriptionKind, id: u64) -> bool;
}

impl<A: 'static> Unsubscribe for ChannelInner<A> {
    fn unsubscribe(&self, kind: SubscriptionKind, id: u64) -> bool {
        // the handler is dropped after the registry guard is released
        let removed = {
            let mut registry = self.registry.lock();
            match kind {
                SubscriptionKind::Persistent => registry.persistent.remove(&id),
                SubscriptionKind::Once => registry.once.remove(&id),
            }
        };
        removed.is_some()
    }

    fn is_subscribed(&self, kind: SubscriptionKind, id: u64) -> bool {
        let registry = self.registry.lock();
        match kind {
            SubscriptionKind::Persistent => registry.persistent.contains_key(&id),
            SubscriptionKind::Once => registry.once.contains_key(&id),
        }
    }
}

/// Multicast notification channel
///
/// Cloning yields another handle to the same set of subscribers.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::EventChannel;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let channel = EventChannel::<usize>::new();
/// let total = Arc::new(AtomicUsize::new(0));
///
/// let sum = Arc::clone(&total);
/// let subscription = channel.subscribe(move |value| {
///     sum.fetch_add(*value, Ordering::SeqCst);
/// });
///
/// channel.fire(&2);
/// channel.fire(&3);
/// subscription.dispose();
/// channel.fire(&100);
///
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// ```
pub struct EventChannel<A> {
    inner: Arc<ChannelInner<A>>,
}

impl<A> Clone for EventChannel<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + Sync + 'static> Default for EventChannel<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + Sync + 'static> EventChannel<A> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                registry: Mutex::new(Registry {
                    persistent: BTreeMap::new(),
                    once: BTreeMap::new(),
                    next_id: 0,
                }),
                upstream: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Invoke `handler` on every fire until the returned handle is disposed
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.register(SubscriptionKind::Persistent, Arc::new(handler))
    }

    /// Invoke `handler` on the next fire only
    pub fn subscribe_once<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.register(SubscriptionKind::Once, Arc::new(handler))
    }

    fn register(&self, kind: SubscriptionKind, handler: Handler<A>) -> Subscription {
        let id = {
            let mut registry = self.inner.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            match kind {
                SubscriptionKind::Persistent => registry.persistent.insert(id, handler),
                SubscriptionKind::Once => registry.once.insert(id, handler),
            };
            id
        };

        let channel: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription {
            channel,
            kind,
            id,
            attached: true,
        }
    }

    /// Deliver `payload` to every connected handler
    ///
    /// Persistent handlers run first in subscription order, then one-shot
    /// handlers newest first. Each one-shot handler is removed before it runs.
    /// Handlers subscribed during this call are not invoked by it.
    pub fn fire(&self, payload: &A) {
        let (persistent, once): (Vec<Handler<A>>, Vec<u64>) = {
            let registry = self.inner.registry.lock();
            (
                registry.persistent.values().cloned().collect(),
                registry.once.keys().rev().copied().collect(),
            )
        };

        for handler in persistent {
            handler(payload);
        }

        for id in once {
            let handler = self.inner.registry.lock().once.remove(&id);
            if let Some(handler) = handler {
                handler(payload);
            }
        }
    }

    /// Future resolving with the payload of the next fire
    ///
    /// Dropping the future before it resolves withdraws its subscription.
    pub fn wait_for_next(&self) -> NextFire<A>
    where
        A: Clone,
    {
        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let subscription = self.subscribe_once(move |payload: &A| {
            if let Some(sender) = sender.lock().take() {
                let _ = sender.send(payload.clone());
            }
        });

        NextFire {
            receiver,
            _subscription: subscription,
        }
    }

    /// Like [`wait_for_next`](Self::wait_for_next), giving up after `timeout`
    pub async fn wait_for_next_timeout(&self, timeout: Duration) -> Option<A>
    where
        A: Clone,
    {
        tokio::time::timeout(timeout, self.wait_for_next())
            .await
            .ok()
            .flatten()
    }

    /// Derived channel that forwards at most one fire per `interval`
    ///
    /// Fires arriving before the interval has elapsed since the last
    /// forwarded one are dropped. Elapsed time is read from the tokio clock,
    /// so it follows a paused or advanced runtime clock. The derived channel
    /// stays connected for as long as any handle to it is alive.
    pub fn throttle(&self, interval: Duration) -> EventChannel<A> {
        let downstream = EventChannel::new();
        let target = Arc::downgrade(&downstream.inner);
        let last_forwarded: Mutex<Option<Instant>> = Mutex::new(None);

        let link = self.subscribe(move |payload: &A| {
            let Some(inner) = target.upgrade() else {
                return;
            };

            {
                let mut last = last_forwarded.lock();
                let now = Instant::now();
                if let Some(at) = *last
                    && now.duration_since(at) < interval
                {
                    return;
                }
                *last = Some(now);
            }

            EventChannel { inner }.fire(payload);
        });

        downstream.inner.upstream.lock().push(link);
        downstream
    }

    pub fn subscriber_count(&self) -> usize {
        let registry = self.inner.registry.lock();
        registry.persistent.len() + registry.once.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

/// Handle to a connected handler
///
/// Dropping the handle disposes the subscription; use
/// [`detach`](Subscription::detach) to keep it for the channel's lifetime.
#[must_use = "dropping a Subscription disconnects its handler"]
pub struct Subscription {
    channel: Weak<dyn Unsubscribe>,
    kind: SubscriptionKind,
    id: u64,
    attached: bool,
}

impl Subscription {
    /// Disconnect the handler; repeated calls are no-ops
    pub fn dispose(&self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unsubscribe(self.kind, self.id);
        }
    }

    /// Keep the handler connected without holding on to the handle
    pub fn detach(mut self) {
        self.attached = false;
    }

    pub fn is_connected(&self) -> bool {
        self.channel
            .upgrade()
            .is_some_and(|channel| channel.is_subscribed(self.kind, self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.attached {
            self.dispose();
        }
    }
}

/// Future returned by [`EventChannel::wait_for_next`]
///
/// Resolves to `None` if the channel is dropped before firing.
pub struct NextFire<A> {
    receiver: oneshot::Receiver<A>,
    _subscription: Subscription,
}

impl<A> Future for NextFire<A> {
    type Output = Option<A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(Result::ok)
    }
}
