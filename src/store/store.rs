use super::config::StoreConfig;
use super::value::FlatValue;
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tracing::{debug, trace, warn};

type Callback = Box<dyn Fn() + Send + Sync>;
type Registry = Mutex<HashMap<String, Vec<Arc<Listener>>>>;

// Nesting depth of `set` on this thread, keyed by store address.
thread_local! {
    static SET_DEPTH: RefCell<HashMap<usize, usize>> = RefCell::new(HashMap::new());
}

/// One registered callback. `active` flips to false on unsubscribe so that a
/// notification pass already holding a snapshot of the list skips it.
struct Listener {
    callback: Callback,
    active: AtomicBool,
}

struct StoreInner<V: ?Sized> {
    value: RwLock<Arc<FlatValue<V>>>,
    subscriptions: Arc<Registry>,
    config: StoreConfig,
}

/// A flat keyed value with per-key change notification.
///
/// `set` replaces the whole snapshot and then, for every key of the new value
/// whose `Arc` differs from the previous one, invokes the callbacks
/// subscribed to that key in subscription order. Callbacks run synchronously
/// with no store lock held, so they may read, subscribe, unsubscribe or call
/// `set` again. Nested `set` calls finish before the outer pass resumes.
///
/// Cloning a `KeyedStore` yields another handle to the same store.
///
/// # Examples
///
/// ```
/// use lazy_context::{FlatValue, KeyedStore};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let store = KeyedStore::new(FlatValue::new().with("age", 12).with("name", 0));
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = hits.clone();
/// let _sub = store.subscribe("age", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// store.set_field("name", 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 0);
///
/// store.set_field("age", 20);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct KeyedStore<V: ?Sized> {
    inner: Arc<StoreInner<V>>,
}

impl<V: ?Sized> KeyedStore<V> {
    /// Create a new store with the given initial value.
    pub fn new(initial: FlatValue<V>) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a new store with the given initial value and configuration.
    pub fn with_config(initial: FlatValue<V>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                value: RwLock::new(Arc::new(initial)),
                subscriptions: Arc::new(Mutex::new(HashMap::new())),
                config,
            }),
        }
    }

    /// The configuration this store was created with.
    pub fn config(&self) -> StoreConfig {
        self.inner.config
    }

    /// Get the current value of one key, or `None` when it is absent.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Get the whole current snapshot.
    pub fn value(&self) -> Arc<FlatValue<V>> {
        Arc::clone(&self.inner.value.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Read the current snapshot with a function.
    pub fn with_value<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&FlatValue<V>) -> R,
    {
        f(&self.value())
    }

    /// Replace the value and notify subscribers of every changed key.
    ///
    /// # Panics
    ///
    /// Panics when called from subscriber callbacks nested deeper than the
    /// configured re-entrancy limit. Use [`try_set`](Self::try_set) to get
    /// an error instead.
    pub fn set(&self, value: FlatValue<V>) {
        if let Err(err) = self.try_set(value) {
            panic!("{err}");
        }
    }

    /// Replace the value and notify subscribers of every changed key.
    ///
    /// Fails without touching the value when the call would exceed the
    /// re-entrancy limit. The outermost `set` runs at depth 1. Depth counts
    /// nesting on the calling thread only.
    pub fn try_set(&self, value: FlatValue<V>) -> Result<()> {
        let _depth = self.enter()?;

        let new = Arc::new(value);
        let old = std::mem::replace(
            &mut *self.inner.value.write().unwrap_or_else(PoisonError::into_inner),
            Arc::clone(&new),
        );

        for key in new.keys() {
            if new.differs_from(&old, key) {
                self.notify(key);
            }
        }

        if self.inner.config.notifies_removed_keys() {
            for key in old.keys().filter(|key| !new.contains_key(key)) {
                self.notify(key);
            }
        }

        Ok(())
    }

    /// Update the value using a function.
    ///
    /// The function receives a copy of the current snapshot whose fields share
    /// their allocations with it; only the fields it replaces notify.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut FlatValue<V>),
    {
        let mut draft = (*self.value()).clone();
        f(&mut draft);
        self.set(draft);
    }

    /// Replace a single field with an already shared value.
    pub fn set_field_arc(&self, key: impl Into<String>, value: Arc<V>) {
        let key = key.into();
        self.update(move |draft| {
            draft.insert_arc(key, value);
        });
    }

    /// Subscribe to changes of one key.
    ///
    /// The key does not have to exist in the current value. The callback stays
    /// registered until the returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let key = key.into();
        let listener = Arc::new(Listener {
            callback: Box::new(callback),
            active: AtomicBool::new(true),
        });

        let mut subscriptions = lock(&self.inner.subscriptions);
        let listeners = subscriptions.entry(key.clone()).or_default();
        listeners.push(Arc::clone(&listener));
        debug!(key = %key, listeners = listeners.len(), "subscribed");
        drop(subscriptions);

        Subscription {
            key,
            listener,
            registry: Arc::downgrade(&self.inner.subscriptions),
            detached: false,
        }
    }

    /// Number of callbacks currently registered for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        lock(&self.inner.subscriptions).get(key).map_or(0, Vec::len)
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn enter(&self) -> Result<DepthGuard> {
        let store = Arc::as_ptr(&self.inner) as *const () as usize;
        let depth = SET_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            let depth = depths.entry(store).or_insert(0);
            *depth += 1;
            *depth
        });
        let guard = DepthGuard { store };

        match self.inner.config.reentrancy_limit() {
            Some(limit) if depth > limit => {
                warn!(depth, limit, "re-entrant set rejected");
                Err(Error::ReentrancyLimit { depth, limit })
            }
            _ => Ok(guard),
        }
    }

    fn notify(&self, key: &str) {
        // Snapshot so callbacks may mutate the list for this key.
        let listeners = match lock(&self.inner.subscriptions).get(key) {
            Some(listeners) if !listeners.is_empty() => listeners.clone(),
            _ => return,
        };

        trace!(key, listeners = listeners.len(), "notifying subscribers");
        for listener in listeners {
            if listener.active.load(Ordering::SeqCst) {
                (listener.callback)();
            }
        }
    }
}

impl<V: ?Sized> Clone for KeyedStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: ?Sized + fmt::Debug> fmt::Debug for KeyedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("value", &self.value())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<V> KeyedStore<V> {
    /// Replace a single field with a new value.
    pub fn set_field(&self, key: impl Into<String>, value: V) {
        self.set_field_arc(key, Arc::new(value));
    }
}

struct DepthGuard {
    store: usize,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        SET_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(depth) = depths.get_mut(&self.store) {
                *depth -= 1;
                if *depth == 0 {
                    depths.remove(&self.store);
                }
            }
        });
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, Vec<Arc<Listener>>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a callback registered with [`KeyedStore::subscribe`].
///
/// Unsubscribing takes effect immediately, including for a notification pass
/// that is already running. Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    key: String,
    listener: Arc<Listener>,
    registry: Weak<Registry>,
    detached: bool,
}

impl Subscription {
    /// Remove the callback from the store. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.listener.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut subscriptions = lock(&registry);
        if let Some(listeners) = subscriptions.get_mut(&self.key) {
            listeners.retain(|listener| !Arc::ptr_eq(listener, &self.listener));
            if listeners.is_empty() {
                subscriptions.remove(&self.key);
            }
        }
        debug!(key = %self.key, "unsubscribed");
    }

    /// The key this subscription listens to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.listener.active.load(Ordering::SeqCst)
    }

    /// Keep the callback registered for as long as the store lives.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}
