#[macro_use]
extern crate tracing;

pub use self::{
    backend::{
        Backend, ConnectionState, InMemoryBackend, RedisBackend, RedisConfig, StoreConfig,
    },
    cache::NamespacedCache,
    error::{CacheError, KindMismatch, Result},
    key::{CacheKey, Namespace},
    registry::{CacheRegistry, TeardownFailure, TeardownReport},
    value::{CacheValue, Number, Numeric, Value, ValueKind},
};

pub mod codec;

mod backend;
mod cache;
mod error;
mod key;
mod registry;
mod value;
