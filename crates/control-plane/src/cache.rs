//! Compiled artifact cache keyed by deploy id.
//!
//! A deploy's payload never changes, so a cached artifact can only ever be
//! missing, never wrong. Evicting is always safe; the runtime recompiles on
//! the next miss.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use fnhost_common::{Error, Result};
use tracing::debug;
use uuid::Uuid;

/// Cache of compiled deploy artifacts.
#[async_trait]
pub trait ModCache: Send + Sync {
    /// Look up the compiled artifact for a deploy.
    async fn get(&self, deploy_id: Uuid) -> Result<Option<Arc<[u8]>>>;

    /// Store a compiled artifact, replacing any previous one.
    async fn put(&self, deploy_id: Uuid, artifact: Arc<[u8]>) -> Result<()>;

    /// Evict the artifact for a deploy. Evicting a missing key is a no-op.
    ///
    /// Rollback awaits this call before responding, so implementations must
    /// return promptly.
    async fn delete(&self, deploy_id: Uuid) -> Result<()>;
}

/// Process-local [`ModCache`].
#[derive(Debug, Default)]
pub struct InMemoryModCache {
    modules: RwLock<HashMap<Uuid, Arc<[u8]>>>,
}

impl InMemoryModCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached artifacts
    pub fn len(&self) -> Result<usize> {
        let modules = self.modules.read().map_err(poisoned)?;
        Ok(modules.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> Error {
    Error::Cache(format!("lock poisoned: {e}"))
}

#[async_trait]
impl ModCache for InMemoryModCache {
    async fn get(&self, deploy_id: Uuid) -> Result<Option<Arc<[u8]>>> {
        let modules = self.modules.read().map_err(poisoned)?;
        Ok(modules.get(&deploy_id).cloned())
    }

    async fn put(&self, deploy_id: Uuid, artifact: Arc<[u8]>) -> Result<()> {
        let mut modules = self.modules.write().map_err(poisoned)?;
        modules.insert(deploy_id, artifact);
        Ok(())
    }

    async fn delete(&self, deploy_id: Uuid) -> Result<()> {
        let mut modules = self.modules.write().map_err(poisoned)?;
        if modules.remove(&deploy_id).is_some() {
            debug!("Evicted compiled module for deploy: {}", deploy_id);
        }
        Ok(())
    }
}
