//! # Lazy Context
//!
//! Fine-grained state broadcast for component trees.
//!
//! A shared value is split into keys, and each consumer is re-run only when a
//! key it actually read changes, instead of whenever any part of the shared
//! value changes.
//!
//! ## Stores (producer side)
//!
//! - `KeyedStore<V>` - A flat keyed value with per-key change notification
//! - `FlatValue<V>` - The snapshot a store holds; fields compare by identity
//! - `Subscription` - Handle that unsubscribes a callback
//!
//! ## Bindings (consumer side)
//!
//! - `LazyBinding<V>` - Subscribes to exactly the keys a consumer reads
//! - `LazyEffect<V>` - A consumer that re-runs when those keys change
//!
//! ## Contexts
//!
//! - `LazyContext<V>`, `Provider<V>` and `Scope` resolve the nearest store
//!   for a consumer without any global state.

pub mod binding;
pub mod context;
pub mod error;
pub mod store;

// Re-export main types for convenience
pub use binding::{create_lazy_binding, create_lazy_effect, LazyBinding, LazyEffect};
pub use context::{LazyContext, Provider, Scope};
pub use error::{Error, Result};
pub use store::{AnyValue, FlatValue, KeyedStore, StoreConfig, Subscription};

/// Create a store holding `initial`.
pub fn create_store<V: ?Sized>(initial: FlatValue<V>) -> KeyedStore<V> {
    KeyedStore::new(initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = create_store(FlatValue::new().with("count", 0));
        let binding = create_lazy_binding(store.clone(), || {});
        assert_eq!(binding.read("count").as_deref(), Some(&0));
        store.set_field("count", 42);
        assert_eq!(binding.read("count").as_deref(), Some(&42));
    }
}
