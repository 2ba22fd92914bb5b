//! Reactive store - shared dashboard state with change notification
//!
//! Holds one state value per store instance, mutated only through shallow-merge
//! patches and read either as a full snapshot (`get`) or through projections.
//! Projections notify only when their own output changes, so consumers that
//! project a small slice of a large state are not woken by unrelated writes.
//!
//! A `set` issued from inside a listener callback is queued and drained by the
//! flush already in progress, never executed inline. Notifications for one
//! patch are fully delivered before the next queued patch is applied.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::watch;

/// Shallow, field-by-field merge of a partial update into a state value.
pub trait Patchable: Clone + Send + Sync + 'static {
    /// Partial update type; unset fields leave the state untouched.
    type Patch: Send + 'static;

    /// Merge `patch` into `self`, field by field.
    fn apply(&mut self, patch: Self::Patch);
}

/// Identifier returned by [`Store::listen`], used to unregister the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

// Returns false once the listener is defunct and should be removed.
type ListenerFn<S> = Box<dyn FnMut(&S) -> bool + Send>;

struct Listener<S> {
    id: ListenerId,
    notify: ListenerFn<S>,
}

struct Inner<S: Patchable> {
    state: Mutex<S>,
    listeners: Mutex<Vec<Listener<S>>>,
    queue: Mutex<VecDeque<S::Patch>>,
    flushing: AtomicBool,
    // Thread currently draining the queue, while it holds `flushing`.
    notifier: Mutex<Option<ThreadId>>,
    next_id: AtomicUsize,
}

/// Handle to a shared state container.
///
/// Cloning is cheap; all clones refer to the same state. Listener callbacks may
/// read (`get`) and write (`set`) the store, but must not register or remove
/// listeners; doing so panics in debug builds.
pub struct Store<S: Patchable> {
    inner: Arc<Inner<S>>,
}

impl<S: Patchable> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Patchable> Store<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(initial),
                listeners: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                flushing: AtomicBool::new(false),
                notifier: Mutex::new(None),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Snapshot of the full current state.
    ///
    /// Always reflects the most recently applied merge; a half-applied patch is
    /// never observable.
    pub fn get(&self) -> S {
        self.inner.state.lock().clone()
    }

    /// Merge a partial update into the state and notify listeners.
    ///
    /// Patches are applied in submission order. When called from inside a
    /// listener callback the patch is queued; the outer flush picks it up after
    /// the current notification pass has completed.
    pub fn set(&self, patch: S::Patch) {
        self.inner.queue.lock().push_back(patch);
        self.flush();
    }

    fn flush(&self) {
        loop {
            if self
                .inner
                .flushing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Another frame is draining (possibly our own caller); the
                // queued patch is its responsibility now.
                return;
            }
            *self.inner.notifier.lock() = Some(thread::current().id());
            loop {
                let patch = self.inner.queue.lock().pop_front();
                let Some(patch) = patch else { break };
                let snapshot = {
                    let mut state = self.inner.state.lock();
                    state.apply(patch);
                    state.clone()
                };
                let mut listeners = self.inner.listeners.lock();
                listeners.retain_mut(|listener| (listener.notify)(&snapshot));
            }
            *self.inner.notifier.lock() = None;
            self.inner.flushing.store(false, Ordering::Release);
            // A patch enqueued between the drain and the release above would
            // otherwise be stranded.
            if self.inner.queue.lock().is_empty() {
                return;
            }
        }
    }

    /// Register a side-effecting callback invoked whenever `selector(state)`
    /// changes (value equality on the selected output).
    ///
    /// The callback does not fire at registration time, only on transitions.
    pub fn listen<P, Sel, F>(&self, selector: Sel, mut callback: F) -> ListenerId
    where
        P: PartialEq + Send + 'static,
        Sel: Fn(&S) -> P + Send + 'static,
        F: FnMut(&P) + Send + 'static,
    {
        self.debug_assert_not_notifying();
        let id = self.next_listener_id();
        let snapshot = self.get();
        let mut last = selector(&snapshot);
        let notify: ListenerFn<S> = Box::new(move |state| {
            let current = selector(state);
            if current != last {
                callback(&current);
                last = current;
            }
            true
        });
        self.inner.listeners.lock().push(Listener { id, notify });
        id
    }

    /// Remove a listener registered with [`Store::listen`].
    pub fn unlisten(&self, id: ListenerId) {
        self.debug_assert_not_notifying();
        self.inner.listeners.lock().retain(|l| l.id != id);
    }

    /// Live-updating projection of the state.
    ///
    /// The returned handle yields the latest projected value via
    /// [`Projection::get`] and wakes [`Projection::changed`] whenever a `set`
    /// changes the projected output. Dropping every handle of a projection
    /// removes it from the store on the next notification pass.
    pub fn watch<P, Proj>(&self, projector: Proj) -> Projection<P>
    where
        P: PartialEq + Clone + Send + Sync + 'static,
        Proj: Fn(&S) -> P + Send + 'static,
    {
        self.debug_assert_not_notifying();
        let id = self.next_listener_id();
        let snapshot = self.get();
        let (tx, rx) = watch::channel(projector(&snapshot));
        let notify: ListenerFn<S> = Box::new(move |state| {
            if tx.receiver_count() == 0 {
                return false;
            }
            let current = projector(state);
            tx.send_if_modified(|slot| {
                if *slot != current {
                    *slot = current;
                    true
                } else {
                    false
                }
            });
            true
        });
        self.inner.listeners.lock().push(Listener { id, notify });
        Projection { rx }
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // Registering or removing a listener from inside a callback would
    // deadlock on the listener vec; fail loudly instead of hanging.
    fn debug_assert_not_notifying(&self) {
        debug_assert_ne!(
            *self.inner.notifier.lock(),
            Some(thread::current().id()),
            "listeners cannot be registered or removed from inside a listener callback"
        );
    }
}

/// Live view of one store projection.
pub struct Projection<P> {
    rx: watch::Receiver<P>,
}

impl<P> Clone for Projection<P> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<P: Clone> Projection<P> {
    /// Latest projected value.
    pub fn get(&self) -> P {
        self.rx.borrow().clone()
    }

    /// Wait until the projected value changes.
    ///
    /// Returns false once the owning store has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Whether a change occurred since the last `get`/`changed` observation.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
