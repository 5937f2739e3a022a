//! Deploy creation and rollback.
//!
//! Both transitions move an application's `active_deploy_id`. The pointer in
//! the store is the source of truth; the compiled module cache is trimmed
//! only after the store has committed the move.

use fnhost_common::{Deploy, Error, Result, UpdateApplication};
use tracing::{info, warn};
use uuid::Uuid;

use crate::service::ControlPlane;

impl ControlPlane {
    /// Publish a new deploy and make it the application's active deploy.
    ///
    /// If the store reports `Error::Activation`, the deploy was persisted
    /// but is not live; `rollback(application_id, deploy_id)` finishes the
    /// move and is safe to repeat.
    pub async fn create_deploy(&self, application_id: Uuid, payload: Vec<u8>) -> Result<Deploy> {
        let app = self.store.get_application(application_id).await?;

        let deploy = Deploy::new(app.id, payload);
        let previous = self.store.create_deploy_and_activate(&deploy).await?;

        info!(
            "Created deploy: {} for application: {} (previous: {:?})",
            deploy.id, app.id, previous
        );
        Ok(deploy)
    }

    /// Point the application back at one of its existing deploys.
    ///
    /// The deposed deploy's compiled module is evicted afterwards. Eviction
    /// failures are logged and never fail the rollback.
    pub async fn rollback(&self, application_id: Uuid, target_deploy_id: Uuid) -> Result<Uuid> {
        let app = self.store.get_application(application_id).await?;

        let target = self.store.get_deploy(target_deploy_id).await?;
        if target.application_id != app.id {
            return Err(Error::Validation(
                "deploy does not belong to application".to_string(),
            ));
        }

        // Evict what the store actually replaced, not what `app` showed
        // before: a concurrent writer may have moved the pointer since.
        let deposed = self
            .store
            .update_application(
                app.id,
                UpdateApplication {
                    active_deploy_id: target.id,
                },
            )
            .await?;

        if let Some(old) = deposed.filter(|old| *old != target.id) {
            if let Err(e) = self.cache.delete(old).await {
                warn!(
                    "Failed to evict compiled module for deploy {}: {}",
                    old, e
                );
            }
        }

        info!(
            "Rolled back application: {} from {:?} to {}",
            app.id, deposed, target.id
        );
        Ok(target.id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use fnhost_common::{Application, LogEntry, NameBounds};

    use super::*;
    use crate::cache::{InMemoryModCache, ModCache};
    use crate::storage::{InMemoryStore, Store};

    /// Delegates to an in-memory store but can be told to fail pointer
    /// updates. Uses the trait's default `create_deploy_and_activate`.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        fail_updates: AtomicBool,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn create_application(&self, app: &Application) -> Result<()> {
            self.inner.create_application(app).await
        }

        async fn get_application(&self, id: Uuid) -> Result<Application> {
            self.inner.get_application(id).await
        }

        async fn update_application(
            &self,
            id: Uuid,
            params: UpdateApplication,
        ) -> Result<Option<Uuid>> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(Error::Store("connection reset".to_string()));
            }
            self.inner.update_application(id, params).await
        }

        async fn create_deploy(&self, deploy: &Deploy) -> Result<()> {
            self.inner.create_deploy(deploy).await
        }

        async fn get_deploy(&self, id: Uuid) -> Result<Deploy> {
            self.inner.get_deploy(id).await
        }

        async fn get_application_logs(&self, id: Uuid) -> Result<Vec<LogEntry>> {
            self.inner.get_application_logs(id).await
        }

        async fn append_log(&self, entry: &LogEntry) -> Result<()> {
            self.inner.append_log(entry).await
        }

        async fn health_check(&self) -> Result<()> {
            self.inner.health_check().await
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl ModCache for BrokenCache {
        async fn get(&self, _deploy_id: Uuid) -> Result<Option<Arc<[u8]>>> {
            Err(Error::Cache("unavailable".to_string()))
        }

        async fn put(&self, _deploy_id: Uuid, _artifact: Arc<[u8]>) -> Result<()> {
            Err(Error::Cache("unavailable".to_string()))
        }

        async fn delete(&self, _deploy_id: Uuid) -> Result<()> {
            Err(Error::Cache("unavailable".to_string()))
        }
    }

    struct Fixture {
        plane: ControlPlane,
        cache: Arc<InMemoryModCache>,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(InMemoryModCache::new());
        let plane = ControlPlane::new(
            Arc::new(InMemoryStore::new()),
            cache.clone(),
            "http://fn.local",
            NameBounds::default(),
        );
        Fixture { plane, cache }
    }

    async fn new_app(plane: &ControlPlane, name: &str) -> Application {
        plane
            .create_application(name.to_string(), HashMap::new())
            .await
            .unwrap()
    }

    async fn active(plane: &ControlPlane, app_id: Uuid) -> Option<Uuid> {
        plane.get_application(app_id).await.unwrap().active_deploy_id
    }

    #[tokio::test]
    async fn test_first_deploy_becomes_active() {
        let Fixture { plane, .. } = fixture();
        let app = new_app(&plane, "first").await;

        let deploy = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();

        assert_eq!(deploy.application_id, app.id);
        assert_eq!(active(&plane, app.id).await, Some(deploy.id));
    }

    #[tokio::test]
    async fn test_history_is_kept() {
        let Fixture { plane, .. } = fixture();
        let app = new_app(&plane, "history").await;

        let d1 = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();
        let d2 = plane.create_deploy(app.id, b"v2".to_vec()).await.unwrap();

        assert_eq!(plane.get_deploy(d1.id).await.unwrap().payload, b"v1");
        assert_eq!(plane.get_deploy(d2.id).await.unwrap().payload, b"v2");
        assert_eq!(active(&plane, app.id).await, Some(d2.id));
    }

    #[tokio::test]
    async fn test_deploy_to_unknown_application() {
        let Fixture { plane, .. } = fixture();

        let err = plane
            .create_deploy(Uuid::new_v4(), b"v1".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApplicationNotFound(_)));
    }

    #[tokio::test]
    async fn test_rollback_repoints_and_evicts_deposed() {
        let Fixture { plane, cache } = fixture();
        let app = new_app(&plane, "rollback").await;

        let d1 = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();
        let d2 = plane.create_deploy(app.id, b"v2".to_vec()).await.unwrap();
        cache.put(d1.id, Arc::from(&b"compiled-v1"[..])).await.unwrap();
        cache.put(d2.id, Arc::from(&b"compiled-v2"[..])).await.unwrap();

        let result = plane.rollback(app.id, d1.id).await.unwrap();

        assert_eq!(result, d1.id);
        assert_eq!(active(&plane, app.id).await, Some(d1.id));
        assert!(cache.get(d2.id).await.unwrap().is_none());
        assert!(cache.get(d1.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_to_active_deploy_keeps_cache() {
        let Fixture { plane, cache } = fixture();
        let app = new_app(&plane, "noop").await;

        let d1 = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();
        cache.put(d1.id, Arc::from(&b"compiled-v1"[..])).await.unwrap();

        assert_eq!(plane.rollback(app.id, d1.id).await.unwrap(), d1.id);
        assert_eq!(active(&plane, app.id).await, Some(d1.id));
        assert!(cache.get(d1.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_rejects_foreign_deploy() {
        let Fixture { plane, .. } = fixture();
        let app = new_app(&plane, "owner").await;
        let other = new_app(&plane, "intruder").await;

        let own = plane.create_deploy(app.id, b"mine".to_vec()).await.unwrap();
        let foreign = plane
            .create_deploy(other.id, b"theirs".to_vec())
            .await
            .unwrap();

        let err = plane.rollback(app.id, foreign.id).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "deploy does not belong to application");
        assert_eq!(active(&plane, app.id).await, Some(own.id));
        assert_eq!(active(&plane, other.id).await, Some(foreign.id));
    }

    #[tokio::test]
    async fn test_rollback_unknown_target() {
        let Fixture { plane, .. } = fixture();
        let app = new_app(&plane, "unknown").await;
        let d1 = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();

        let err = plane.rollback(app.id, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, Error::DeployNotFound(_)));
        assert_eq!(active(&plane, app.id).await, Some(d1.id));
    }

    #[tokio::test]
    async fn test_rollback_unknown_application() {
        let Fixture { plane, .. } = fixture();

        let err = plane
            .rollback(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApplicationNotFound(_)));
    }

    #[tokio::test]
    async fn test_cache_failure_does_not_fail_rollback() {
        let plane = ControlPlane::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(BrokenCache),
            "http://fn.local",
            NameBounds::default(),
        );
        let app = new_app(&plane, "brokencache").await;
        let d1 = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();
        plane.create_deploy(app.id, b"v2".to_vec()).await.unwrap();

        assert_eq!(plane.rollback(app.id, d1.id).await.unwrap(), d1.id);
        assert_eq!(active(&plane, app.id).await, Some(d1.id));
    }

    #[tokio::test]
    async fn test_failed_activation_leaves_deploy_addressable() {
        let store = Arc::new(FlakyStore::default());
        let plane = ControlPlane::new(
            store.clone(),
            Arc::new(InMemoryModCache::new()),
            "http://fn.local",
            NameBounds::default(),
        );
        let app = new_app(&plane, "flaky").await;
        let d1 = plane.create_deploy(app.id, b"v1".to_vec()).await.unwrap();

        store.fail_updates.store(true, Ordering::SeqCst);
        let err = plane
            .create_deploy(app.id, b"v2".to_vec())
            .await
            .unwrap_err();

        let deploy_id = match err {
            Error::Activation { deploy_id, .. } => deploy_id,
            other => panic!("expected activation error, got {other:?}"),
        };
        assert_eq!(plane.get_deploy(deploy_id).await.unwrap().payload, b"v2");
        assert_eq!(active(&plane, app.id).await, Some(d1.id));

        // finishing the move is a plain re-point, and repeating it is harmless
        store.fail_updates.store(false, Ordering::SeqCst);
        assert_eq!(plane.rollback(app.id, deploy_id).await.unwrap(), deploy_id);
        assert_eq!(plane.rollback(app.id, deploy_id).await.unwrap(), deploy_id);
        assert_eq!(active(&plane, app.id).await, Some(deploy_id));
    }
}
