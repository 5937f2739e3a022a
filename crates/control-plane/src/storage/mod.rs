//! Persistence for applications, deploys and their logs.
//!
//! The control plane only ever talks to [`Store`]; the in-memory and Redis
//! backends are interchangeable behind it.

mod memory;
mod redis_store;

use async_trait::async_trait;
use fnhost_common::{Application, Deploy, Error, LogEntry, Result, UpdateApplication};
use uuid::Uuid;

pub use self::memory::InMemoryStore;
pub use self::redis_store::RedisStore;

/// Storage backend for the control plane.
///
/// Implementations must linearize `update_application` per application: two
/// concurrent updates to the same application leave exactly one of the
/// written values behind, never a mix and never something nobody wrote.
/// Deploys are append-only; no operation removes or rewrites one.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new application. Fails with `Conflict` if the id is taken.
    async fn create_application(&self, app: &Application) -> Result<()>;

    /// Fetch an application. Fails with `ApplicationNotFound` if absent.
    async fn get_application(&self, id: Uuid) -> Result<Application>;

    /// Apply a partial update to an application's mutable fields.
    ///
    /// Returns the `active_deploy_id` that was replaced, read atomically with
    /// the write. Re-applying the same update is harmless.
    async fn update_application(
        &self,
        id: Uuid,
        params: UpdateApplication,
    ) -> Result<Option<Uuid>>;

    /// Persist a new deploy. Fails with `Conflict` if the id is taken.
    async fn create_deploy(&self, deploy: &Deploy) -> Result<()>;

    /// Fetch a deploy. Fails with `DeployNotFound` if absent.
    async fn get_deploy(&self, id: Uuid) -> Result<Deploy>;

    /// Logs for an application, oldest first.
    async fn get_application_logs(&self, id: Uuid) -> Result<Vec<LogEntry>>;

    /// Append a runtime log line to its application's log.
    async fn append_log(&self, entry: &LogEntry) -> Result<()>;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> Result<()>;

    /// Persist `deploy` and make it its application's active deploy.
    ///
    /// Returns the deploy id that was active before. Backends that can do
    /// both writes atomically should override this. The default runs them in
    /// sequence and reports a failed second step as `Error::Activation`; the
    /// deploy then exists but is not live, and re-pointing to it is safe.
    async fn create_deploy_and_activate(&self, deploy: &Deploy) -> Result<Option<Uuid>> {
        self.create_deploy(deploy).await?;

        self.update_application(
            deploy.application_id,
            UpdateApplication {
                active_deploy_id: deploy.id,
            },
        )
        .await
        .map_err(|e| Error::Activation {
            deploy_id: deploy.id,
            reason: e.to_string(),
        })
    }
}
