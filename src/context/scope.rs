use crate::binding::{LazyBinding, LazyEffect};
use crate::store::{FlatValue, KeyedStore, StoreConfig};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// A slot of shared state that consumers resolve through a [`Scope`].
///
/// The context owns a default store, used by consumers that no [`Provider`]
/// encloses. Providers created from the context override it for the scopes
/// they are provided into.
///
/// # Examples
///
/// ```
/// use lazy_context::{FlatValue, LazyContext, Scope};
///
/// let settings = LazyContext::new(FlatValue::new().with("theme", "light"));
/// let root = Scope::root();
/// assert!(settings.resolve(&root).ptr_eq(settings.default_store()));
///
/// let provider = settings.provider(FlatValue::new().with("theme", "dark"));
/// let child = root.provide(&provider);
/// assert_eq!(settings.resolve(&child).get("theme").as_deref(), Some(&"dark"));
/// ```
pub struct LazyContext<V: ?Sized> {
    id: usize,
    default: KeyedStore<V>,
}

impl<V: ?Sized + Send + Sync + 'static> LazyContext<V> {
    /// Create a context whose default store holds `default`.
    pub fn new(default: FlatValue<V>) -> Self {
        Self::with_config(default, StoreConfig::default())
    }

    /// Create a context whose stores, default and provided, use `config`.
    pub fn with_config(default: FlatValue<V>, config: StoreConfig) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            default: KeyedStore::with_config(default, config),
        }
    }

    /// The store used where no provider encloses the consumer.
    pub fn default_store(&self) -> &KeyedStore<V> {
        &self.default
    }

    /// Create a provider with its own store, seeded with `initial`.
    pub fn provider(&self, initial: FlatValue<V>) -> Provider<V> {
        Provider {
            context_id: self.id,
            store: KeyedStore::with_config(initial, self.default.config()),
        }
    }

    /// The store of the nearest provider of this context enclosing `scope`,
    /// or the default store when there is none.
    pub fn resolve(&self, scope: &Scope) -> KeyedStore<V> {
        scope
            .lookup::<V>(self.id)
            .unwrap_or_else(|| self.default.clone())
    }

    /// Bind a consumer in `scope` to the store it resolves to.
    pub fn bind<F>(&self, scope: &Scope, on_invalidate: F) -> LazyBinding<V>
    where
        F: Fn() + Send + Sync + 'static,
    {
        LazyBinding::new(self.resolve(scope), on_invalidate)
    }

    /// Run a consumer in `scope` as a [`LazyEffect`].
    pub fn effect<F>(&self, scope: &Scope, f: F) -> LazyEffect<V>
    where
        F: Fn(&LazyBinding<V>) + Send + Sync + 'static,
    {
        crate::binding::create_lazy_effect(self.resolve(scope), f)
    }
}

impl<V: ?Sized> fmt::Debug for LazyContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyContext").field("id", &self.id).finish()
    }
}

/// Overrides a [`LazyContext`] for the scopes it is provided into.
///
/// A provider creates its store once. New values pushed through
/// [`update`](Self::update) go into that same store, so consumers bound to it
/// keep their subscriptions.
pub struct Provider<V: ?Sized> {
    context_id: usize,
    store: KeyedStore<V>,
}

impl<V: ?Sized> Provider<V> {
    /// Push a new value into the provider's store.
    pub fn update(&self, value: FlatValue<V>) {
        self.store.set(value);
    }

    /// The store this provider created.
    pub fn store(&self) -> &KeyedStore<V> {
        &self.store
    }
}

impl<V: ?Sized> fmt::Debug for Provider<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("context_id", &self.context_id)
            .finish()
    }
}

struct ScopeNode {
    context_id: usize,
    store: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<ScopeNode>>,
}

/// A position in a consumer tree, carrying the providers that enclose it.
///
/// Scopes are immutable and cheap to clone. [`provide`](Self::provide)
/// returns a child scope; the parent is left untouched.
#[derive(Clone, Default)]
pub struct Scope {
    node: Option<Arc<ScopeNode>>,
}

impl Scope {
    /// A scope enclosed by no provider.
    pub fn root() -> Self {
        Self::default()
    }

    /// A child scope in which `provider` overrides its context.
    pub fn provide<V: ?Sized + Send + Sync + 'static>(&self, provider: &Provider<V>) -> Scope {
        debug!(context_id = provider.context_id, "providing context");
        Scope {
            node: Some(Arc::new(ScopeNode {
                context_id: provider.context_id,
                store: Arc::new(provider.store.clone()),
                parent: self.node.clone(),
            })),
        }
    }

    /// Number of providers enclosing this scope.
    pub fn depth(&self) -> usize {
        std::iter::successors(self.node.as_deref(), |node| node.parent.as_deref()).count()
    }

    fn lookup<V: ?Sized + Send + Sync + 'static>(&self, context_id: usize) -> Option<KeyedStore<V>> {
        std::iter::successors(self.node.as_deref(), |node| node.parent.as_deref())
            .find(|node| node.context_id == context_id)
            .and_then(|node| node.store.downcast_ref::<KeyedStore<V>>())
            .cloned()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("depth", &self.depth()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_resolves_to_default() {
        let context = LazyContext::new(FlatValue::new().with("name", "mark"));
        let store = context.resolve(&Scope::root());
        assert!(store.ptr_eq(context.default_store()));
        assert_eq!(store.get("name").as_deref(), Some(&"mark"));
    }

    #[test]
    fn nearest_provider_wins() {
        let context = LazyContext::new(FlatValue::new().with("name", "mark"));
        let outer = context.provider(FlatValue::new().with("name", "outer"));
        let inner = context.provider(FlatValue::new().with("name", "inner"));

        let outer_scope = Scope::root().provide(&outer);
        let inner_scope = outer_scope.provide(&inner);

        assert_eq!(inner_scope.depth(), 2);
        assert!(context.resolve(&outer_scope).ptr_eq(outer.store()));
        assert!(context.resolve(&inner_scope).ptr_eq(inner.store()));
    }

    #[test]
    fn unrelated_context_is_skipped() {
        let theme = LazyContext::new(FlatValue::new().with("theme", "light"));
        let user = LazyContext::new(FlatValue::new().with("name", "mark"));
        let user_provider = user.provider(FlatValue::new().with("name", "bar"));

        let scope = Scope::root().provide(&user_provider);
        assert!(theme.resolve(&scope).ptr_eq(theme.default_store()));
        assert!(user.resolve(&scope).ptr_eq(user_provider.store()));
    }

    #[test]
    fn provider_update_keeps_store_and_subscriptions() {
        let context = LazyContext::new(FlatValue::new().with("name", "mark"));
        let provider = context.provider(FlatValue::new().with("name", "foo"));
        let scope = Scope::root().provide(&provider);

        let effect = context.effect(&scope, |binding| {
            binding.read("name");
        });

        provider.update(FlatValue::new().with("name", "bar"));
        assert!(context.resolve(&scope).ptr_eq(provider.store()));
        assert_eq!(effect.run_count(), 2);
        assert_eq!(effect.binding().read("name").as_deref(), Some(&"bar"));
    }

    #[test]
    fn provider_inherits_context_config() {
        let config = StoreConfig::default().notify_removed_keys(true);
        let context = LazyContext::with_config(FlatValue::<i32>::new(), config);
        let provider = context.provider(FlatValue::new());
        assert_eq!(provider.store().config(), config);
    }
}
