use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::{
    error::{CacheError, Result},
    key::{CacheKey, Namespace},
    value::{Number, Value, ValueKind},
};

use super::Backend;

type Entries = HashMap<Box<str>, Value>;

/// Process-local store without durability.
///
/// Every namespace lives in its own map. Operations hold the namespace's
/// shard lock for their whole duration and never suspend while doing so,
/// which makes read-modify-write operations atomic even on a multi-threaded
/// runtime.
#[derive(Default)]
pub struct InMemoryBackend {
    namespaces: DashMap<Box<str>, Entries>,
    closed: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::unavailable("backend has been torn down", None))
        } else {
            Ok(())
        }
    }

    fn read<T>(&self, namespace: &str, f: impl FnOnce(Option<&Entries>) -> T) -> Result<T> {
        self.ensure_open()?;

        Ok(f(self.namespaces.get(namespace).as_deref()))
    }

    fn write<T>(&self, namespace: &str, f: impl FnOnce(&mut Entries) -> T) -> Result<T> {
        self.ensure_open()?;

        let mut entries = match self.namespaces.get_mut(namespace) {
            Some(entries) => entries,
            None => self.namespaces.entry(Box::from(namespace)).or_default(),
        };

        Ok(f(&mut entries))
    }

    /// Like [`write`](Self::write) but leaves namespaces without entries
    /// untouched and drops a namespace once it's empty.
    fn write_existing<T>(
        &self,
        namespace: &str,
        absent: T,
        f: impl FnOnce(&mut Entries) -> T,
    ) -> Result<T> {
        self.ensure_open()?;

        let Some(mut entries) = self.namespaces.get_mut(namespace) else {
            return Ok(absent);
        };

        let res = f(&mut entries);
        drop(entries);

        self.namespaces.remove_if(namespace, |_, entries| entries.is_empty());

        Ok(res)
    }

    fn add(&self, key: &CacheKey, amount: Number, subtract: bool) -> Result<Number> {
        self.write(key.namespace(), |entries| -> Result<_> {
            let zero = match amount {
                Number::Int(_) => Value::Int(0),
                Number::Float(_) => Value::Float(0.0),
            };

            let current = entries.get(key.key()).unwrap_or(&zero);

            let updated = match (current, amount) {
                (Value::Int(current), Number::Int(amount)) => {
                    let updated = if subtract {
                        current.checked_sub(amount)
                    } else {
                        current.checked_add(amount)
                    };

                    updated.map(Number::Int).ok_or_else(|| CacheError::Overflow {
                        key: Box::from(key.key()),
                    })?
                }
                (Value::Float(current), Number::Float(amount)) if subtract => {
                    Number::Float(current - amount)
                }
                (Value::Float(current), Number::Float(amount)) => Number::Float(current + amount),
                (current, amount) => {
                    return Err(CacheError::TypeMismatch {
                        key: Box::from(key.key()),
                        expected: amount.kind(),
                        found: Some(current.kind()),
                    })
                }
            };

            entries.insert(Box::from(key.key()), Value::from(updated));

            Ok(updated)
        })?
    }
}

fn checked(key: &CacheKey, value: &Value, kind: ValueKind) -> Result<()> {
    if value.kind() == kind {
        Ok(())
    } else {
        Err(CacheError::TypeMismatch {
            key: Box::from(key.key()),
            expected: kind,
            found: Some(value.kind()),
        })
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn get(&self, key: &CacheKey, kind: ValueKind) -> Result<Option<Value>> {
        self.read(key.namespace(), |entries| -> Result<_> {
            match entries.and_then(|entries| entries.get(key.key())) {
                Some(value) => checked(key, value, kind).map(|_| Some(value.clone())),
                None => Ok(None),
            }
        })?
    }

    async fn set(&self, key: &CacheKey, value: &Value) -> Result<()> {
        self.write(key.namespace(), |entries| {
            entries.insert(Box::from(key.key()), value.clone());
        })
    }

    async fn set_many(&self, namespace: &Namespace, entries: &[(CacheKey, Value)]) -> Result<()> {
        self.write(namespace.as_str(), |stored| {
            for (key, value) in entries {
                debug_assert_eq!(key.namespace(), namespace.as_str());
                stored.insert(Box::from(key.key()), value.clone());
            }
        })
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.write_existing(key.namespace(), false, |entries| {
            entries.remove(key.key()).is_some()
        })
    }

    async fn pop(&self, key: &CacheKey, kind: ValueKind) -> Result<Option<Value>> {
        self.write_existing(key.namespace(), Ok(None), |entries| -> Result<_> {
            match entries.get(key.key()) {
                Some(value) => checked(key, value, kind)?,
                None => return Ok(None),
            }

            Ok(entries.remove(key.key()))
        })?
    }

    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        self.read(key.namespace(), |entries| {
            entries.map_or(false, |entries| entries.contains_key(key.key()))
        })
    }

    async fn increment(&self, key: &CacheKey, amount: Number) -> Result<Number> {
        self.add(key, amount, false)
    }

    async fn decrement(&self, key: &CacheKey, amount: Number) -> Result<Number> {
        self.add(key, amount, true)
    }

    async fn compare_and_swap(
        &self,
        key: &CacheKey,
        current: Option<&Value>,
        new: &Value,
    ) -> Result<bool> {
        let swap = |entries: &mut Entries| -> Result<_> {
            let stored = entries.get(key.key());

            if let Some(stored) = stored {
                checked(key, stored, new.kind())?;
            }

            let unchanged = match (stored, current) {
                (None, None) => true,
                (Some(stored), Some(current)) => stored.same_as(current),
                _ => false,
            };

            if unchanged {
                entries.insert(Box::from(key.key()), new.clone());
            }

            Ok(unchanged)
        };

        match current {
            Some(_) => self.write_existing(key.namespace(), Ok(false), swap)?,
            None => self.write(key.namespace(), swap)?,
        }
    }

    fn items<'a>(
        &'a self,
        namespace: &'a Namespace,
        kind: ValueKind,
    ) -> BoxStream<'a, Result<(String, Value)>> {
        // The snapshot is taken on first poll so that creating the stream
        // alone does not observe anything
        stream::once(async move {
            self.read(namespace.as_str(), |entries| {
                entries
                    .into_iter()
                    .flatten()
                    .map(|(key, value)| (String::from(&**key), value.clone()))
                    .collect::<Vec<_>>()
            })
        })
        .map_ok(move |snapshot| {
            stream::iter(snapshot).map(move |(key, value)| {
                if value.kind() == kind {
                    Ok((key, value))
                } else {
                    Err(CacheError::TypeMismatch {
                        found: Some(value.kind()),
                        expected: kind,
                        key: key.into_boxed_str(),
                    })
                }
            })
        })
        .try_flatten()
        .boxed()
    }

    async fn length(&self, namespace: &Namespace) -> Result<usize> {
        self.read(namespace.as_str(), |entries| entries.map_or(0, HashMap::len))
    }

    async fn clear(&self, namespace: &Namespace) -> Result<usize> {
        self.ensure_open()?;

        let removed = self
            .namespaces
            .remove(namespace.as_str())
            .map_or(0, |(_, entries)| entries.len());

        Ok(removed)
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let namespaces = self.namespaces.len();
            self.namespaces.clear();
            debug!(namespaces, "Dropped in-memory cache data");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eyre::Result;
    use futures::TryStreamExt;

    use super::*;

    fn key(namespace: &str, key: &str) -> CacheKey {
        Namespace::new(namespace).unwrap().key(key)
    }

    #[tokio::test]
    async fn increment_keeps_mismatched_value() -> Result<()> {
        let backend = InMemoryBackend::new();
        let key = key("scores", "alice");

        backend.set(&key, &Value::Bool(true)).await?;
        let err = backend.increment(&key, Number::Int(1)).await.unwrap_err();

        assert!(err.is_type_mismatch());
        assert_eq!(backend.get(&key, ValueKind::Bool).await?, Some(Value::Bool(true)));

        Ok(())
    }

    #[tokio::test]
    async fn increment_overflow_keeps_value() -> Result<()> {
        let backend = InMemoryBackend::new();
        let key = key("scores", "max");

        backend.set(&key, &Value::Int(i64::MAX)).await?;
        let err = backend.increment(&key, Number::Int(1)).await.unwrap_err();

        assert!(matches!(err, CacheError::Overflow { .. }));
        assert_eq!(backend.get(&key, ValueKind::Int).await?, Some(Value::Int(i64::MAX)));

        Ok(())
    }

    #[tokio::test]
    async fn removals_leave_no_empty_namespaces() -> Result<()> {
        let backend = InMemoryBackend::new();
        let key = key("games", "channel");

        assert!(!backend.delete(&key).await?);
        assert_eq!(backend.pop(&key, ValueKind::Str).await?, None);
        assert!(!backend.compare_and_swap(&key, Some(&Value::Int(1)), &Value::Int(2)).await?);
        assert!(backend.namespaces.is_empty());

        backend.set(&key, &Value::Str("running".to_owned())).await?;
        assert_eq!(backend.namespaces.len(), 1);

        backend.pop(&key, ValueKind::Str).await?;
        assert!(backend.namespaces.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn overflowing_decrement_stores_nothing() -> Result<()> {
        let backend = InMemoryBackend::new();
        let key = key("scores", "missing");

        let err = backend.decrement(&key, Number::Int(i64::MIN)).await.unwrap_err();

        assert!(matches!(err, CacheError::Overflow { .. }));
        assert!(!backend.contains(&key).await?);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_atomic() -> Result<()> {
        let backend = Arc::new(InMemoryBackend::new());
        let key = key("counters", "hits");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let backend = Arc::clone(&backend);
                let key = key.clone();

                tokio::spawn(async move {
                    for _ in 0..250 {
                        backend.increment(&key, Number::Int(1)).await?;
                    }

                    Ok::<_, CacheError>(())
                })
            })
            .collect();

        for task in tasks {
            task.await??;
        }

        assert_eq!(backend.get(&key, ValueKind::Int).await?, Some(Value::Int(4000)));

        Ok(())
    }

    #[tokio::test]
    async fn items_snapshot_is_restartable() -> Result<()> {
        let backend = InMemoryBackend::new();
        let namespace = Namespace::new("cooldowns")?;

        backend.set(&namespace.key("a"), &Value::Float(1.0)).await?;
        backend.set(&namespace.key("b"), &Value::Float(2.0)).await?;

        for _ in 0..2 {
            let mut items: Vec<_> = backend
                .items(&namespace, ValueKind::Float)
                .try_collect()
                .await?;
            items.sort_by(|(a, _), (b, _)| a.cmp(b));

            assert_eq!(
                items,
                [
                    ("a".to_owned(), Value::Float(1.0)),
                    ("b".to_owned(), Value::Float(2.0)),
                ]
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() -> Result<()> {
        let backend = InMemoryBackend::new();
        let key = key("a", "x");

        backend.set(&key, &Value::Int(1)).await?;
        backend.disconnect().await?;
        backend.disconnect().await?;

        assert!(backend.get(&key, ValueKind::Int).await.unwrap_err().is_unavailable());

        Ok(())
    }
}
