use crate::error::{Error, Result};
use crate::store::{AnyValue, KeyedStore, Subscription};
use indexmap::{IndexMap, IndexSet};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct BindingState {
    tracked: IndexSet<String>,
    active: IndexMap<String, Subscription>,
    disposed: bool,
}

/// A read-tracking view of a [`KeyedStore`] owned by one consumer.
///
/// The first [`read`](Self::read) of a key subscribes the binding to that key;
/// a change to it calls the invalidation trigger supplied at construction.
/// Keys that are never read are never subscribed. Subscriptions only
/// accumulate: a key read once stays subscribed until the binding is disposed,
/// even if later evaluations stop reading it.
///
/// Dropping the binding disposes it.
pub struct LazyBinding<V: ?Sized> {
    store: KeyedStore<V>,
    invalidate: Arc<dyn Fn() + Send + Sync>,
    state: Mutex<BindingState>,
}

impl<V: ?Sized> LazyBinding<V> {
    /// Bind to `store`, calling `on_invalidate` whenever a key this binding
    /// has read changes.
    pub fn new<F>(store: KeyedStore<V>, on_invalidate: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            store,
            invalidate: Arc::new(on_invalidate),
            state: Mutex::new(BindingState {
                tracked: IndexSet::new(),
                active: IndexMap::new(),
                disposed: false,
            }),
        }
    }

    /// Read a key and start tracking it.
    ///
    /// # Panics
    ///
    /// In debug builds, panics when the binding has been disposed. Release
    /// builds return the store value without tracking it.
    pub fn read(&self, key: &str) -> Option<Arc<V>> {
        debug_assert!(
            !self.is_disposed(),
            "lazy binding read of `{key}` after dispose"
        );
        let value = self.store.get(key);
        self.track(key);
        value
    }

    /// Read a key and start tracking it, failing once the binding is disposed.
    pub fn try_read(&self, key: &str) -> Result<Option<Arc<V>>> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        let value = self.store.get(key);
        self.track(key);
        Ok(value)
    }

    /// Release every subscription. Later calls are no-ops.
    pub fn dispose(&self) {
        let active = {
            let mut state = self.state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.tracked.clear();
            std::mem::take(&mut state.active)
        };

        debug!(keys = active.len(), "disposing lazy binding");
        for subscription in active.values() {
            subscription.unsubscribe();
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.state().disposed
    }

    /// Keys read so far, in first-read order.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.state().tracked.iter().cloned().collect()
    }

    /// Whether this binding holds a subscription for `key`.
    pub fn is_subscribed(&self, key: &str) -> bool {
        self.state().active.contains_key(key)
    }

    /// The store this binding reads from.
    pub fn store(&self) -> &KeyedStore<V> {
        &self.store
    }

    fn track(&self, key: &str) {
        let mut state = self.state();
        if state.disposed {
            return;
        }
        if !state.tracked.contains(key) {
            state.tracked.insert(key.to_owned());
        }
        if !state.active.contains_key(key) {
            let invalidate = Arc::clone(&self.invalidate);
            let subscription = self.store.subscribe(key, move || invalidate());
            state.active.insert(key.to_owned(), subscription);
        }
    }

    fn state(&self) -> MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LazyBinding<AnyValue> {
    /// Read a key of a heterogeneous store as `T`.
    ///
    /// The key is tracked even when it is missing or holds another type.
    pub fn read_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.read(key)?.downcast::<T>().ok()
    }
}

impl<V: ?Sized> Drop for LazyBinding<V> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<V: ?Sized> fmt::Debug for LazyBinding<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("LazyBinding")
            .field("tracked", &state.tracked)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// Create a lazy binding over `store`.
///
/// # Example
///
/// ```
/// use lazy_context::{create_lazy_binding, FlatValue, KeyedStore};
///
/// let store = KeyedStore::new(FlatValue::new().with("name", "foo").with("age", "12"));
/// let binding = create_lazy_binding(store.clone(), || {});
///
/// assert_eq!(binding.read("name").as_deref(), Some(&"foo"));
/// assert_eq!(store.subscriber_count("name"), 1);
/// assert_eq!(store.subscriber_count("age"), 0);
/// ```
pub fn create_lazy_binding<V, F>(store: KeyedStore<V>, on_invalidate: F) -> LazyBinding<V>
where
    V: ?Sized,
    F: Fn() + Send + Sync + 'static,
{
    LazyBinding::new(store, on_invalidate)
}
