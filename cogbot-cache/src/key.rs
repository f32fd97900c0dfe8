use std::{
    borrow::Borrow,
    fmt::{Display, Formatter, Result as FmtResult},
};

use bb8_redis::redis::{RedisWrite, ToRedisArgs};

use crate::error::{CacheError, Result};

/// Name of a logical cache. Prefixes every key stored through it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace(Box<str>);

impl Namespace {
    pub const SEPARATOR: char = ':';

    /// Namespaces must be non-empty and may neither contain the separator nor
    /// whitespace or control characters.
    pub fn new(name: impl Into<Box<str>>) -> Result<Self> {
        let name = name.into();

        let valid = !name.is_empty()
            && !name
                .chars()
                .any(|c| c == Self::SEPARATOR || c.is_whitespace() || c.is_control());

        if valid {
            Ok(Self(name))
        } else {
            Err(CacheError::InvalidNamespace(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn key(&self, key: &str) -> CacheKey {
        let mut full = String::with_capacity(self.0.len() + 1 + key.len());
        full.push_str(&self.0);
        full.push(Self::SEPARATOR);
        full.push_str(key);

        CacheKey {
            full,
            split: self.0.len() + 1,
        }
    }

    /// Glob pattern matching all keys of this namespace, as used by `SCAN`.
    pub(crate) fn scan_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.0.len() + 2);

        for c in self.0.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^') {
                pattern.push('\\');
            }

            pattern.push(c);
        }

        pattern.push(Self::SEPARATOR);
        pattern.push('*');

        pattern
    }

    /// Strips the namespace prefix off a fully qualified key.
    pub(crate) fn strip<'k>(&self, full: &'k str) -> Option<&'k str> {
        full.strip_prefix(&*self.0)?.strip_prefix(Self::SEPARATOR)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Namespace {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A key qualified with its namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    full: String,
    split: usize,
}

impl CacheKey {
    pub fn namespace(&self) -> &str {
        &self.full[..self.split - 1]
    }

    /// The key without its namespace.
    pub fn key(&self) -> &str {
        &self.full[self.split..]
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.full)
    }
}

impl ToRedisArgs for CacheKey {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.full.as_bytes());
    }
}
