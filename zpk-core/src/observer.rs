//! Thread-safe listener registry.
//!
//! Registration and removal hold the lock only while the list is mutated.
//! `notify` snapshots the list, releases the lock, and then calls each
//! listener, so a listener may add or remove listeners (itself included)
//! from inside its callback. A panicking listener is logged and skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

pub trait Listener<E>: Send + Sync {
    fn on_event(&self, event: &E);
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

struct State<E> {
    listeners: Vec<Arc<dyn Listener<E>>>,
    disposed: bool,
}

pub struct ListenerList<E> {
    state: Mutex<State<E>>,
}

impl<E> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("ListenerList")
            .field("listeners", &st.listeners.len())
            .field("disposed", &st.disposed)
            .finish()
    }
}

impl<E> ListenerList<E> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                listeners: Vec::new(),
                disposed: false,
            }),
        }
    }

    // Listeners never run under the lock; a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `listener`. Returns false if the same listener is already
    /// registered or the list has been disposed.
    pub fn add(&self, listener: Arc<dyn Listener<E>>) -> bool {
        let mut st = self.lock();
        if st.disposed {
            return false;
        }
        if st
            .listeners
            .iter()
            .any(|l| std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(&listener)))
        {
            return false;
        }
        st.listeners.push(listener);
        true
    }

    pub fn remove(&self, listener: &Arc<dyn Listener<E>>) -> bool {
        let mut st = self.lock();
        let before = st.listeners.len();
        st.listeners
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
        st.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Deliver `event` to every listener registered at the time of the call.
    /// Returns the number of listeners that handled it without panicking.
    pub fn notify(&self, event: &E) -> usize {
        let snapshot: Vec<Arc<dyn Listener<E>>> = {
            let st = self.lock();
            if st.disposed {
                return 0;
            }
            st.listeners.clone()
        };
        let mut delivered = 0;
        for l in snapshot {
            match catch_unwind(AssertUnwindSafe(|| l.on_event(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => warn!(reason = panic_message(&*payload), "listener panicked"),
            }
        }
        delivered
    }

    /// Deliver a final event, then drop every listener. Later `add` and
    /// `notify` calls are no-ops.
    pub fn dispose(&self, last: &E) {
        let snapshot = {
            let mut st = self.lock();
            if st.disposed {
                return;
            }
            st.disposed = true;
            std::mem::take(&mut st.listeners)
        };
        for l in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| l.on_event(last))) {
                warn!(reason = panic_message(&*payload), "listener panicked during dispose");
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn Listener<u32>>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let l: Arc<dyn Listener<u32>> = Arc::new(move |_: &u32| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, l)
    }

    #[test]
    fn same_listener_is_added_once() {
        let list = ListenerList::new();
        let (hits, l) = counter();
        assert!(list.add(l.clone()));
        assert!(!list.add(l.clone()));
        assert_eq!(list.len(), 1);
        assert_eq!(list.notify(&7), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_stops_delivery() {
        let list = ListenerList::new();
        let (hits, l) = counter();
        list.add(l.clone());
        assert!(list.remove(&l));
        assert!(!list.remove(&l));
        list.notify(&1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let list = ListenerList::new();
        fn explode(_: &u32) {
            panic!("boom");
        }
        let bad: Arc<dyn Listener<u32>> = Arc::new(explode);
        let (hits, good) = counter();
        list.add(bad);
        list.add(good);
        assert_eq!(list.notify(&3), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // the list is still usable afterwards
        assert_eq!(list.notify(&4), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_may_register_during_notify() {
        let list = Arc::new(ListenerList::<u32>::new());
        let (late_hits, late) = counter();
        let weak = Arc::downgrade(&list);
        let adder: Arc<dyn Listener<u32>> = Arc::new(move |_: &u32| {
            if let Some(list) = weak.upgrade() {
                list.add(late.clone());
            }
        });
        list.add(adder);

        // the snapshot taken for this call does not include the new listener
        assert_eq!(list.notify(&1), 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert_eq!(list.len(), 2);

        list.notify(&2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_delivers_once_and_clears() {
        let list = ListenerList::new();
        let (hits, l) = counter();
        list.add(l.clone());
        list.dispose(&0);
        list.dispose(&0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(list.is_disposed());
        assert!(list.is_empty());
        assert!(!list.add(l));
        assert_eq!(list.notify(&9), 0);
    }

    #[test]
    fn concurrent_notify_and_add() {
        let list = Arc::new(ListenerList::<u32>::new());
        let (hits, l) = counter();
        list.add(l);
        std::thread::scope(|s| {
            for _ in 0..4 {
                let list = list.clone();
                s.spawn(move || {
                    for i in 0..100 {
                        list.notify(&i);
                        let (_, extra) = counter();
                        list.add(extra.clone());
                        list.remove(&extra);
                    }
                });
            }
        });
        assert_eq!(hits.load(Ordering::SeqCst), 400);
        assert_eq!(list.len(), 1);
    }
}
