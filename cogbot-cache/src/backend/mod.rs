use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    error::Result,
    key::{CacheKey, Namespace},
    value::{Number, Value, ValueKind},
};

pub use self::{
    memory::InMemoryBackend,
    redis::{ConnectionState, RedisBackend},
};

mod memory;
mod redis;

/// Storage behind a [`NamespacedCache`](crate::NamespacedCache).
///
/// Reads receive the kind the caller expects and fail with
/// [`CacheError::TypeMismatch`](crate::CacheError::TypeMismatch) if the stored
/// value is of another kind.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &CacheKey, kind: ValueKind) -> Result<Option<Value>>;

    async fn set(&self, key: &CacheKey, value: &Value) -> Result<()>;

    /// Overwrite all entries at once. All keys belong to `namespace`.
    async fn set_many(&self, namespace: &Namespace, entries: &[(CacheKey, Value)]) -> Result<()>;

    /// Returns whether the key was present.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Remove the key and return what it held.
    async fn pop(&self, key: &CacheKey, kind: ValueKind) -> Result<Option<Value>>;

    async fn contains(&self, key: &CacheKey) -> Result<bool>;

    /// Add `amount` to the stored number, starting from zero if the key is
    /// absent, and return the new value.
    async fn increment(&self, key: &CacheKey, amount: Number) -> Result<Number>;

    /// Subtract `amount` from the stored number, starting from zero if the
    /// key is absent, and return the new value.
    async fn decrement(&self, key: &CacheKey, amount: Number) -> Result<Number>;

    /// Store `new` only if the key still holds `current`, where `None` means
    /// the key is absent. Returns whether `new` was stored.
    ///
    /// A stored value of another kind than `new` fails with
    /// [`CacheError::TypeMismatch`](crate::CacheError::TypeMismatch).
    async fn compare_and_swap(
        &self,
        key: &CacheKey,
        current: Option<&Value>,
        new: &Value,
    ) -> Result<bool>;

    /// Lazily iterate all entries of the namespace.
    ///
    /// Every call starts a fresh iteration. Concurrent writes may or may not
    /// be observed.
    fn items<'a>(
        &'a self,
        namespace: &'a Namespace,
        kind: ValueKind,
    ) -> BoxStream<'a, Result<(String, Value)>>;

    async fn length(&self, namespace: &Namespace) -> Result<usize>;

    /// Remove all keys of the namespace and return how many there were.
    async fn clear(&self, namespace: &Namespace) -> Result<usize>;

    /// Release held resources. Subsequent calls are no-ops, subsequent
    /// operations fail.
    async fn disconnect(&self) -> Result<()>;
}

/// Which store to use; decided once at startup.
#[derive(Clone, Debug)]
pub enum StoreConfig {
    InMemory,
    Redis(RedisConfig),
}

impl StoreConfig {
    pub fn build(self) -> Result<Arc<dyn Backend>> {
        match self {
            Self::InMemory => {
                info!("Using in-memory cache backend; data will not persist across restarts");

                Ok(Arc::new(InMemoryBackend::new()))
            }
            Self::Redis(config) => {
                info!(pool_size = config.pool_size, "Using redis cache backend");

                RedisBackend::new(config).map(|backend| Arc::new(backend) as Arc<dyn Backend>)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: Box<str>,
    pub pool_size: u32,
    /// Upper bound for a single connection attempt.
    pub connect_timeout: Duration,
}

impl RedisConfig {
    pub const DEFAULT_POOL_SIZE: u32 = 16;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(url: impl Into<Box<str>>) -> Self {
        Self {
            url: url.into(),
            pool_size: Self::DEFAULT_POOL_SIZE,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
