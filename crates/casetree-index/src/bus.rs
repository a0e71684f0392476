//! Publish/subscribe fan-out
//!
//! [`SubscriptionBus`] delivers events to registered listeners without
//! holding any lock while a listener runs, so listeners may re-enter the
//! publisher. Registration returns a [`Subscription`] handle; dropping it
//! deregisters the listener.

use dashmap::DashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identifier of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Get raw ID
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Listener<E> = dyn Fn(&E) + Send + Sync;

struct Slot<E> {
    live: AtomicBool,
    listener: Box<Listener<E>>,
}

struct BusInner<E> {
    next_id: AtomicU64,
    slots: DashMap<SubscriptionId, Arc<Slot<E>>>,
}

impl<E> BusInner<E> {
    fn remove(&self, id: SubscriptionId) -> bool {
        match self.slots.remove(&id) {
            Some((_, slot)) => {
                slot.live.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

/// Fan-out notifier for events of type `E`
///
/// No ordering is guaranteed among listeners.
pub struct SubscriptionBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E: 'static> SubscriptionBus<E> {
    /// Create bus with no listeners
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                slots: DashMap::new(),
            }),
        }
    }

    /// Register listener
    ///
    /// The listener stays registered until the returned handle is dropped
    /// or cancelled.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.slots.insert(
            id,
            Arc::new(Slot {
                live: AtomicBool::new(true),
                listener: Box::new(listener),
            }),
        );

        let bus: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(bus) = bus.upgrade() {
                bus.remove(id);
            }
        })
    }

    /// Deliver `event` to every live listener
    ///
    /// Listeners run on the calling thread, outside any bus lock. A panicking
    /// listener is logged and skipped. Returns the number of listeners that
    /// completed.
    pub fn publish(&self, event: &E) -> usize {
        let slots: Vec<(SubscriptionId, Arc<Slot<E>>)> = self
            .inner
            .slots
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut delivered = 0;
        for (id, slot) in slots {
            // Deregistered after the listing was taken.
            if !slot.live.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (slot.listener)(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(subscription = %id, "listener panicked during notification"),
            }
        }
        delivered
    }

    /// Number of registered listeners
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.slots.len()
    }
}

impl<E: 'static> Default for SubscriptionBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for SubscriptionBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("listeners", &self.inner.slots.len())
            .finish()
    }
}

/// Registration handle
///
/// Dropping the handle deregisters deterministically. Handles that outlive
/// their publisher are inert.
#[must_use = "dropping a Subscription deregisters it immediately"]
pub struct Subscription {
    id: SubscriptionId,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    /// Get subscription ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Deregister now
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Allocates IDs for handles issued outside a bus
#[derive(Debug, Default)]
pub(crate) struct IdAllocator(AtomicU64);

impl IdAllocator {
    pub(crate) fn next(&self) -> SubscriptionId {
        SubscriptionId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        (count, move |_: &u32| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn publish_reaches_every_listener_once() {
        let bus = SubscriptionBus::<u32>::new();
        let (a, listener_a) = counter();
        let (b, listener_b) = counter();
        let _sa = bus.subscribe(listener_a);
        let _sb = bus.subscribe(listener_b);

        assert_eq!(bus.publish(&7), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_handle_deregisters() {
        let bus = SubscriptionBus::<u32>::new();
        let (count, listener) = counter();
        let sub = bus.subscribe(listener);
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.publish(&1), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_deregisters() {
        let bus = SubscriptionBus::<u32>::new();
        let (_, listener) = counter();
        bus.subscribe(listener).cancel();
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn handle_outliving_bus_is_inert() {
        let bus = SubscriptionBus::<u32>::new();
        let (_, listener) = counter();
        let sub = bus.subscribe(listener);
        drop(bus);
        drop(sub);
    }

    #[test]
    fn panicking_listener_does_not_stop_fan_out() {
        let bus = SubscriptionBus::<u32>::new();
        let _bad = bus.subscribe(|_: &u32| panic!("listener bug"));
        let (count, listener) = counter();
        let _good = bus.subscribe(listener);

        assert_eq!(bus.publish(&3), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_reenter_bus() {
        let bus = Arc::new(SubscriptionBus::<u32>::new());
        let inner = Arc::clone(&bus);
        let observed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&observed);
        let _sub = bus.subscribe(move |_: &u32| {
            seen.store(inner.listener_count(), Ordering::SeqCst);
        });

        bus.publish(&0);
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ids_are_unique() {
        let bus = SubscriptionBus::<u32>::new();
        let a = bus.subscribe(|_: &u32| {});
        let b = bus.subscribe(|_: &u32| {});
        assert_ne!(a.id(), b.id());
    }
}
