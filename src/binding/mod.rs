//! Read-tracking consumers of a [`KeyedStore`](crate::KeyedStore).
//!
//! This module provides the consumer side of a store:
//! - Lazy bindings: subscribe to exactly the keys a consumer reads
//! - Lazy effects: consumers that re-run when those keys change

mod effect;
mod lazy;

pub use effect::{create_lazy_effect, LazyEffect};
pub use lazy::{create_lazy_binding, LazyBinding};
