use std::sync::Arc;

use cogbot_cache::{Backend, CacheRegistry, CacheValue, NamespacedCache};
use eyre::{Result, WrapErr};

use super::BotConfig;

/// Shared state handed to every cog while it loads.
pub struct Context {
    registry: CacheRegistry,
    backend: Arc<dyn Backend>,
}

impl Context {
    pub fn init() -> Result<Self> {
        let backend = BotConfig::get()
            .cache
            .clone()
            .build()
            .context("failed to build cache backend")?;

        Ok(Self::new(backend))
    }

    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            registry: CacheRegistry::new(),
            backend,
        }
    }

    pub fn cache<V: CacheValue>(&self, namespace: &str) -> Result<NamespacedCache<V>> {
        self.registry
            .cache(namespace, &self.backend)
            .with_context(|| format!("failed to create cache `{namespace}`"))
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    #[cold]
    pub async fn shutdown(&self) {
        let report = self.registry.teardown_all().await;

        for failure in report.failures.iter() {
            let namespaces: Vec<_> = failure.namespaces.iter().map(|ns| ns.as_str()).collect();
            error!(?namespaces, error = ?failure.error, "Failed to close cache backend");
        }

        info!(
            closed = report.closed,
            failed = report.failures.len(),
            "Closed cache backends"
        );
    }
}
