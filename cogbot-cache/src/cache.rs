use std::{
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
    sync::Arc,
};

use futures::{Stream, TryStreamExt};

use crate::{
    backend::Backend,
    error::{CacheError, Result},
    key::Namespace,
    registry::CacheRegistry,
    value::{CacheValue, Number, Numeric, Value},
};

/// Typed view onto one namespace of a backend.
///
/// Each feature module creates its caches once while loading and keeps them
/// for the lifetime of the process. All keys are stored as
/// `namespace:key`, so caches sharing a backend never see each other's
/// entries.
///
/// Every read expects values of type `V`; a stored value of another type
/// results in [`CacheError::TypeMismatch`] rather than a conversion.
pub struct NamespacedCache<V> {
    namespace: Namespace,
    backend: Arc<dyn Backend>,
    phantom: PhantomData<fn() -> V>,
}

impl<V: CacheValue> NamespacedCache<V> {
    /// Fails if the namespace is invalid or already registered.
    pub fn new(
        registry: &CacheRegistry,
        namespace: &str,
        backend: &Arc<dyn Backend>,
    ) -> Result<Self> {
        let namespace = Namespace::new(namespace)?;
        registry.register(&namespace, backend)?;

        debug!(
            %namespace,
            backend = backend.name(),
            kind = %V::KIND,
            "Created namespaced cache"
        );

        Ok(Self {
            namespace,
            backend: Arc::clone(backend),
            phantom: PhantomData,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn typed(&self, key: &str, value: Value) -> Result<V> {
        V::from_value(value).map_err(|value| CacheError::TypeMismatch {
            key: Box::from(key),
            expected: V::KIND,
            found: Some(value.kind()),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        self.backend
            .get(&self.namespace.key(key), V::KIND)
            .await?
            .map(|value| self.typed(key, value))
            .transpose()
    }

    /// Like [`get`](Self::get) but falls back to `default` if the key is
    /// absent.
    pub async fn get_or(&self, key: &str, default: V) -> Result<V> {
        self.get(key).await.map(|value| value.unwrap_or(default))
    }

    pub async fn set(&self, key: &str, value: V) -> Result<()> {
        trace!(namespace = %self.namespace, key, "Setting cache entry");

        self.backend
            .set(&self.namespace.key(key), &value.into_value())
            .await
    }

    /// Set multiple entries in one atomic operation.
    pub async fn update<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
    {
        let entries: Vec<_> = entries
            .into_iter()
            .map(|(key, value)| (self.namespace.key(key.as_ref()), value.into_value()))
            .collect();

        if entries.is_empty() {
            return Ok(());
        }

        trace!(namespace = %self.namespace, len = entries.len(), "Updating cache entries");

        self.backend.set_many(&self.namespace, &entries).await
    }

    /// Returns whether the key was present.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        trace!(namespace = %self.namespace, key, "Deleting cache entry");

        self.backend.delete(&self.namespace.key(key)).await
    }

    /// Remove the key and return its value.
    pub async fn pop(&self, key: &str) -> Result<Option<V>> {
        self.backend
            .pop(&self.namespace.key(key), V::KIND)
            .await?
            .map(|value| self.typed(key, value))
            .transpose()
    }

    /// Store `new` only if the key still holds `current`, with `None`
    /// meaning the key is absent. Returns whether `new` was stored.
    ///
    /// Use this instead of a `get` followed by a `set` whenever the new value
    /// depends on the old one, so that concurrent writers are noticed.
    pub async fn compare_and_swap(&self, key: &str, current: Option<V>, new: V) -> Result<bool> {
        let current = current.map(CacheValue::into_value);

        self.backend
            .compare_and_swap(&self.namespace.key(key), current.as_ref(), &new.into_value())
            .await
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.backend.contains(&self.namespace.key(key)).await
    }

    /// Iterate over all entries of this namespace.
    ///
    /// Nothing is fetched until the stream is polled and every call starts
    /// over. Entries written or deleted during the iteration may or may not
    /// be included.
    pub fn items(&self) -> impl Stream<Item = Result<(String, V)>> + Send + '_ {
        self.backend
            .items(&self.namespace, V::KIND)
            .and_then(move |(key, value)| {
                let res = self.typed(&key, value).map(|value| (key, value));

                async move { res }
            })
    }

    pub async fn to_map(&self) -> Result<HashMap<String, V>> {
        self.items().try_collect().await
    }

    pub async fn length(&self) -> Result<usize> {
        self.backend.length(&self.namespace).await
    }

    /// Remove all entries of this namespace, returning how many there were.
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.backend.clear(&self.namespace).await?;
        debug!(namespace = %self.namespace, removed, "Cleared cache");

        Ok(removed)
    }
}

impl<V: Numeric> NamespacedCache<V> {
    /// Add `amount` to the stored number, treating an absent key as zero.
    pub async fn increment(&self, key: &str, amount: V) -> Result<V> {
        let updated = self
            .backend
            .increment(&self.namespace.key(key), amount.into_number())
            .await?;

        self.number(key, updated)
    }

    /// Subtract `amount` from the stored number, treating an absent key as
    /// zero.
    pub async fn decrement(&self, key: &str, amount: V) -> Result<V> {
        let updated = self
            .backend
            .decrement(&self.namespace.key(key), amount.into_number())
            .await?;

        self.number(key, updated)
    }

    fn number(&self, key: &str, number: Number) -> Result<V> {
        V::from_number(number).ok_or_else(|| CacheError::TypeMismatch {
            key: Box::from(key),
            expected: V::KIND,
            found: Some(number.kind()),
        })
    }
}

impl<V> Debug for NamespacedCache<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("NamespacedCache")
            .field("namespace", &self.namespace)
            .field("backend", &self.backend.name())
            .finish()
    }
}
