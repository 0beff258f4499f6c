use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Value type for stores whose fields hold different Rust types.
pub type AnyValue = dyn Any + Send + Sync;

/// A flat, insertion-ordered mapping from string keys to shared values.
///
/// Each field is held behind an [`Arc`]. Two snapshots agree on a field only
/// when both point at the same allocation, so updating a field means storing a
/// new `Arc` for it while untouched fields are carried over by cloning theirs.
pub struct FlatValue<V: ?Sized> {
    entries: IndexMap<String, Arc<V>>,
}

impl<V: ?Sized> FlatValue<V> {
    /// Create an empty value.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Builder form of [`insert_arc`](Self::insert_arc).
    pub fn with_arc(mut self, key: impl Into<String>, value: Arc<V>) -> Self {
        self.insert_arc(key, value);
        self
    }

    /// Insert an already shared value, keeping its identity.
    ///
    /// Replacing an existing key keeps the key's original position.
    pub fn insert_arc(&mut self, key: impl Into<String>, value: Arc<V>) -> Option<Arc<V>> {
        self.entries.insert(key.into(), value)
    }

    /// Remove a key, shifting later keys down to keep their order.
    pub fn remove(&mut self, key: &str) -> Option<Arc<V>> {
        self.entries.shift_remove(key)
    }

    /// Get the shared value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Arc<V>> {
        self.entries.get(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<V>)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the value has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` holds a different allocation here than in `previous`.
    ///
    /// A key missing from one side and present on the other counts as changed.
    pub fn differs_from(&self, previous: &Self, key: &str) -> bool {
        match (self.entries.get(key), previous.entries.get(key)) {
            (Some(new), Some(old)) => !Arc::ptr_eq(new, old),
            (None, None) => false,
            _ => true,
        }
    }
}

impl<V> FlatValue<V> {
    /// Builder form of [`insert`](Self::insert).
    pub fn with(self, key: impl Into<String>, value: V) -> Self {
        self.with_arc(key, Arc::new(value))
    }

    /// Insert a freshly allocated value. The field always counts as changed.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<Arc<V>> {
        self.insert_arc(key, Arc::new(value))
    }
}

impl FlatValue<AnyValue> {
    /// Insert a value of any type into a heterogeneous snapshot.
    pub fn with_any<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert_any(key, value);
        self
    }

    /// Insert a value of any type, replacing the key's previous value.
    pub fn insert_any<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Option<Arc<AnyValue>> {
        self.insert_arc(key, Arc::new(value) as Arc<AnyValue>)
    }
}

impl<V: ?Sized> Default for FlatValue<V> {
    fn default() -> Self {
        Self::new()
    }
}

// Cloning copies the `Arc`s, so every field keeps its identity.
impl<V: ?Sized> Clone for FlatValue<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V: ?Sized + fmt::Debug> fmt::Debug for FlatValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: ?Sized> FromIterator<(K, Arc<V>)> for FlatValue<V> {
    fn from_iter<I: IntoIterator<Item = (K, Arc<V>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }
}
