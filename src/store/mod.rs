//! Keyed stores with per-key change notification.
//!
//! A [`KeyedStore`] holds a [`FlatValue`] snapshot. Replacing the snapshot
//! notifies only the subscribers of keys whose value changed identity.

mod config;
mod store;
mod value;

pub use config::{StoreConfig, DEFAULT_MAX_REENTRANCY_DEPTH};
pub use store::{KeyedStore, Subscription};
pub use value::{AnyValue, FlatValue};
