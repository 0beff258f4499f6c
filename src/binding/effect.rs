use super::lazy::LazyBinding;
use crate::store::KeyedStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

struct EffectInner<V: ?Sized> {
    binding: LazyBinding<V>,
    run: Box<dyn Fn(&LazyBinding<V>) + Send + Sync>,
    runs: AtomicUsize,
}

impl<V: ?Sized> EffectInner<V> {
    fn run(&self) {
        if self.binding.is_disposed() {
            return;
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        (self.run)(&self.binding);
    }
}

/// A consumer that re-runs whenever a key it read changes.
///
/// This is the smallest possible host for a [`LazyBinding`]: the consumer runs
/// once on creation, and its invalidation trigger re-runs it synchronously
/// inside the store's notification pass.
pub struct LazyEffect<V: ?Sized> {
    inner: Arc<EffectInner<V>>,
}

impl<V: ?Sized + Send + Sync + 'static> LazyEffect<V> {
    fn new<F>(store: KeyedStore<V>, f: F) -> Self
    where
        F: Fn(&LazyBinding<V>) + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<EffectInner<V>>| {
            let weak = weak.clone();
            EffectInner {
                binding: LazyBinding::new(store, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.run();
                    }
                }),
                run: Box::new(f),
                runs: AtomicUsize::new(0),
            }
        });

        inner.run();
        Self { inner }
    }
}

impl<V: ?Sized> LazyEffect<V> {
    /// Number of times the consumer has run, including the initial run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// The binding the consumer reads through.
    pub fn binding(&self) -> &LazyBinding<V> {
        &self.inner.binding
    }

    /// Stop re-running and release the binding's subscriptions.
    pub fn dispose(&self) {
        self.inner.binding.dispose();
    }
}

/// Create an effect that reads `store` through a lazy binding.
///
/// The effect runs immediately and then again whenever any key it has read
/// changes.
///
/// # Example
///
/// ```
/// use lazy_context::{create_lazy_effect, FlatValue, KeyedStore};
///
/// let store = KeyedStore::new(FlatValue::new().with("age", 12).with("name", 0));
/// let effect = create_lazy_effect(store.clone(), |binding| {
///     let _age = binding.read("age");
/// });
///
/// store.set_field("name", 1);
/// assert_eq!(effect.run_count(), 1);
///
/// store.set_field("age", 20);
/// assert_eq!(effect.run_count(), 2);
/// ```
pub fn create_lazy_effect<V, F>(store: KeyedStore<V>, f: F) -> LazyEffect<V>
where
    V: ?Sized + Send + Sync + 'static,
    F: Fn(&LazyBinding<V>) + Send + Sync + 'static,
{
    LazyEffect::new(store, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FlatValue;
    use std::sync::Mutex;

    #[test]
    fn effect_runs_immediately() {
        let store = KeyedStore::new(FlatValue::new().with("a", 1));
        let effect = create_lazy_effect(store, |_| {});
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_sees_the_new_value() {
        let store = KeyedStore::new(FlatValue::new().with("a", 1));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _effect = create_lazy_effect(store.clone(), move |binding| {
            let a = binding.read("a").map(|a| *a);
            seen_clone.lock().unwrap().push(a);
        });

        store.set_field("a", 2);
        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn conditional_reads_stay_subscribed() {
        let store = KeyedStore::new(FlatValue::new().with("gate", true).with("b", false));
        let effect = create_lazy_effect(store.clone(), |binding| {
            if *binding.read("gate").expect("gate present") {
                binding.read("b");
            }
        });
        assert!(effect.binding().is_subscribed("b"));

        store.set_field("gate", false);
        assert_eq!(effect.run_count(), 2);

        // `b` is no longer read but still re-runs the effect.
        store.update(|draft| {
            draft.insert("b", true);
        });
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn disposed_effect_stops_running() {
        let store = KeyedStore::new(FlatValue::new().with("a", 1));
        let effect = create_lazy_effect(store.clone(), |binding| {
            binding.read("a");
        });

        effect.dispose();
        store.set_field("a", 2);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn dropping_effect_unsubscribes() {
        let store = KeyedStore::new(FlatValue::new().with("a", 1));
        let effect = create_lazy_effect(store.clone(), |binding| {
            binding.read("a");
        });
        assert_eq!(store.subscriber_count("a"), 1);

        drop(effect);
        assert_eq!(store.subscriber_count("a"), 0);
    }
}
