/// Nested `set` depth allowed by default before a store fails fast.
pub const DEFAULT_MAX_REENTRANCY_DEPTH: usize = 64;

/// Behavioural knobs for a [`KeyedStore`](super::KeyedStore).
///
/// # Examples
///
/// ```
/// use lazy_context::StoreConfig;
///
/// let config = StoreConfig::default()
///     .notify_removed_keys(true)
///     .max_reentrancy_depth(None);
/// assert!(config.notifies_removed_keys());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    notify_removed_keys: bool,
    max_reentrancy_depth: Option<usize>,
}

impl StoreConfig {
    /// Notify subscribers of keys that were present in the old value but are
    /// missing from the new one. Off by default: removed keys stay silent.
    pub fn notify_removed_keys(mut self, enabled: bool) -> Self {
        self.notify_removed_keys = enabled;
        self
    }

    /// Limit how deeply subscriber callbacks may re-enter `set`.
    /// `None` removes the guard entirely.
    pub fn max_reentrancy_depth(mut self, limit: Option<usize>) -> Self {
        self.max_reentrancy_depth = limit;
        self
    }

    /// Whether removed keys notify their subscribers.
    pub fn notifies_removed_keys(&self) -> bool {
        self.notify_removed_keys
    }

    /// The maximum nested `set` depth, if any.
    pub fn reentrancy_limit(&self) -> Option<usize> {
        self.max_reentrancy_depth
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            notify_removed_keys: false,
            max_reentrancy_depth: Some(DEFAULT_MAX_REENTRANCY_DEPTH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_removed_keys_silent() {
        let config = StoreConfig::default();
        assert!(!config.notifies_removed_keys());
        assert_eq!(config.reentrancy_limit(), Some(DEFAULT_MAX_REENTRANCY_DEPTH));
    }

    #[test]
    fn builder_overrides() {
        let config = StoreConfig::default()
            .notify_removed_keys(true)
            .max_reentrancy_depth(Some(3));
        assert!(config.notifies_removed_keys());
        assert_eq!(config.reentrancy_limit(), Some(3));
    }
}
