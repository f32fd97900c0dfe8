use std::{mem, sync::Arc};

use parking_lot::Mutex;

use crate::{
    backend::Backend,
    cache::NamespacedCache,
    error::{CacheError, Result},
    key::Namespace,
    value::CacheValue,
};

struct Registration {
    namespace: Namespace,
    backend: Arc<dyn Backend>,
}

/// All caches created during startup.
///
/// Constructed once by the host and handed to each feature module while it
/// loads. Guarantees that no two caches share a namespace and closes every
/// backend on shutdown.
#[derive(Default)]
pub struct CacheRegistry {
    registrations: Mutex<Vec<Registration>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache for the namespace on the given backend.
    pub fn cache<V: CacheValue>(
        &self,
        namespace: &str,
        backend: &Arc<dyn Backend>,
    ) -> Result<NamespacedCache<V>> {
        NamespacedCache::new(self, namespace, backend)
    }

    pub fn register(&self, namespace: &Namespace, backend: &Arc<dyn Backend>) -> Result<()> {
        let mut registrations = self.registrations.lock();

        if registrations.iter().any(|reg| &reg.namespace == namespace) {
            return Err(CacheError::DuplicateNamespace(Box::from(namespace.as_str())));
        }

        registrations.push(Registration {
            namespace: namespace.to_owned(),
            backend: Arc::clone(backend),
        });

        Ok(())
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        self.registrations
            .lock()
            .iter()
            .map(|reg| reg.namespace.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Disconnect every registered backend once, no matter how many
    /// namespaces share it, and forget all registrations.
    ///
    /// A failing backend does not prevent the others from being closed.
    /// Calling this again afterwards does nothing.
    #[cold]
    pub async fn teardown_all(&self) -> TeardownReport {
        let registrations = mem::take(&mut *self.registrations.lock());

        let mut groups: Vec<(Arc<dyn Backend>, Vec<Namespace>)> = Vec::new();

        for Registration { namespace, backend } in registrations {
            let existing = groups
                .iter_mut()
                .find(|(other, _)| same_backend(other, &backend));

            match existing {
                Some((_, namespaces)) => namespaces.push(namespace),
                None => groups.push((backend, vec![namespace])),
            }
        }

        let mut report = TeardownReport::default();

        for (backend, namespaces) in groups {
            match backend.disconnect().await {
                Ok(_) => {
                    debug!(backend = backend.name(), ?namespaces, "Disconnected cache backend");
                    report.closed += 1;
                }
                Err(error) => {
                    warn!(backend = backend.name(), ?error, "Failed to disconnect cache backend");
                    report.failures.push(TeardownFailure { namespaces, error });
                }
            }
        }

        report
    }
}

fn same_backend(a: &Arc<dyn Backend>, b: &Arc<dyn Backend>) -> bool {
    // Compare data pointers only; vtable pointers of the same type may differ
    // between codegen units
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[derive(Debug, Default)]
#[must_use]
pub struct TeardownReport {
    /// Amount of backends that disconnected successfully.
    pub closed: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct TeardownFailure {
    /// Namespaces that were using the backend.
    pub namespaces: Vec<Namespace>,
    pub error: CacheError,
}
