//! Error types for store and binding misuse.
//!
//! Expected conditions (reading a missing key, unsubscribing twice) are not
//! errors; they resolve to `None` or a no-op. Only caller misuse surfaces here.

/// Errors returned by the fallible store and binding operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A [`LazyBinding`](crate::LazyBinding) was read after it was disposed.
    #[error("lazy binding read after it was disposed")]
    Disposed,

    /// A subscriber callback re-entered `set` more deeply than the store allows.
    #[error("re-entrant set at depth {depth} exceeds the limit of {limit}")]
    ReentrancyLimit {
        /// Depth the rejected call would have run at.
        depth: usize,
        /// Configured maximum depth.
        limit: usize,
    },
}

/// Shorthand for results carrying an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
