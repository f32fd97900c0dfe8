use bb8_redis::redis::RedisError;
use thiserror::Error;

use crate::value::ValueKind;

pub type Result<T, E = CacheError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {reason}")]
    BackendUnavailable {
        reason: &'static str,
        #[source]
        source: Option<RedisError>,
    },
    #[error("namespace `{0}` is already registered")]
    DuplicateNamespace(Box<str>),
    #[error("invalid namespace `{0}`")]
    InvalidNamespace(Box<str>),
    #[error("incrementing `{key}` would overflow")]
    Overflow { key: Box<str> },
    #[error("redis error")]
    Store(#[from] RedisError),
    #[error("expected {expected} for `{key}`, found {}", .found.map_or("an unrecognized record", ValueKind::article_name))]
    TypeMismatch {
        key: Box<str>,
        expected: ValueKind,
        /// `None` if the stored record does not carry any known tag.
        found: Option<ValueKind>,
    },
    #[error("unsupported value type: {found}")]
    UnsupportedType { found: &'static str },
}

impl CacheError {
    pub(crate) fn unavailable(reason: &'static str, source: Option<RedisError>) -> Self {
        Self::BackendUnavailable { reason, source }
    }

    /// Whether the error stems from connectivity rather than from the caller.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}

/// Outcome of checking a stored value against the kind a caller expects.
///
/// Carries no key so the codec can stay key-agnostic; callers attach it
/// through [`KindMismatch::with_key`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KindMismatch {
    pub expected: ValueKind,
    pub found: Option<ValueKind>,
}

impl KindMismatch {
    pub fn with_key(self, key: &str) -> CacheError {
        CacheError::TypeMismatch {
            key: Box::from(key),
            expected: self.expected,
            found: self.found,
        }
    }
}
