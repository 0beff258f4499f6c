//! Explicit scoping of stores over a consumer tree.
//!
//! A [`LazyContext`] names a slot of shared state, a [`Provider`] overrides it
//! for a subtree, and a [`Scope`] is what a consumer carries to find the
//! nearest enclosing store.

mod scope;

pub use scope::{LazyContext, Provider, Scope};
