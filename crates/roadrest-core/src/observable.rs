//! The propagation bus: a last-value-cached observable value.
//!
//! Each manager publishes its state through [`Observable`] handles and
//! subscribes to exactly the upstream values it depends on. The
//! dependency graph is a DAG by construction; no manager subscribes to
//! its own downstream consumers.
//!
//! Semantics:
//! - `set` is equality-gated: publishing an unchanged value is a no-op
//!   from the subscribers' point of view.
//! - Subscribers are invoked synchronously with the new value, outside
//!   the internal lock, so a callback may freely read or set *other*
//!   observables.
//! - New subscribers immediately receive the cached current value.
//! - Dropping the returned [`Subscription`] unsubscribes.

use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct Inner<T> {
    value: T,
    subscribers: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

/// A shared, last-value-cached observable. Handles are cheap to clone
/// and refer to the same underlying value.
pub struct Observable<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: initial,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// A clone of the current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Publish a new value. Returns `true` if the value changed and
    /// subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        let callbacks = {
            let mut inner = self.lock();
            if inner.value == value {
                return false;
            }
            inner.value = value.clone();
            inner
                .subscribers
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect::<Vec<_>>()
        };
        for cb in callbacks {
            cb(&value);
        }
        true
    }

    /// Register a subscriber. The current value is replayed to it
    /// immediately; afterwards it runs on every change until the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let callback: Callback<T> = Arc::new(f);
        let (id, current) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Arc::clone(&callback)));
            (id, inner.value.clone())
        };
        callback(&current);

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                    inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
                }
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to an active subscription. Dropping it detaches the
/// subscriber from the observable.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn replays_current_value_on_subscribe() {
        let value = Observable::new(7);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = value.subscribe(move |v| sink.lock().unwrap().push(*v));
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn set_is_equality_gated() {
        let value = Observable::new(1);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = value.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1); // replay

        assert!(!value.set(1)); // unchanged, no publication
        assert!(value.set(2));
        assert!(!value.set(2));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn all_subscribers_observe_each_change() {
        let value = Observable::new(0);
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let a2 = Arc::clone(&a);
        let b2 = Arc::clone(&b);
        let _sa = value.subscribe(move |v| a2.store(*v, Ordering::SeqCst));
        let _sb = value.subscribe(move |v| b2.store(*v, Ordering::SeqCst));
        value.set(42);
        assert_eq!(a.load(Ordering::SeqCst), 42);
        assert_eq!(b.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let value = Observable::new(0);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sub = value.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        value.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        drop(sub);
        value.set(2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callback_may_set_a_downstream_observable() {
        let upstream = Observable::new(0);
        let downstream: Observable<i32> = Observable::new(0);
        let down = downstream.clone();
        let _sub = upstream.subscribe(move |v| {
            down.set(v * 10);
        });
        upstream.set(3);
        assert_eq!(downstream.get(), 30);
    }
}
