//! Application registry: the read side of the control plane and application
//! creation. Deploy creation and rollback live in [`crate::versioning`].

use std::collections::HashMap;
use std::sync::Arc;

use fnhost_common::{Application, Deploy, LogEntry, NameBounds, Result};
use tracing::info;
use uuid::Uuid;

use crate::cache::ModCache;
use crate::storage::Store;

/// Entry point for every control plane operation.
///
/// Holds no mutable state of its own; all coordination between concurrent
/// callers happens in the [`Store`].
#[derive(Clone)]
pub struct ControlPlane {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) cache: Arc<dyn ModCache>,
    function_base_url: String,
    name_bounds: NameBounds,
}

impl ControlPlane {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn ModCache>,
        function_base_url: impl Into<String>,
        name_bounds: NameBounds,
    ) -> Self {
        Self {
            store,
            cache,
            function_base_url: function_base_url.into(),
            name_bounds,
        }
    }

    /// Validate the name and persist a new application with no active deploy.
    pub async fn create_application(
        &self,
        name: String,
        environment: HashMap<String, String>,
    ) -> Result<Application> {
        self.name_bounds.validate(&name)?;

        let app = Application::new(name, environment, &self.function_base_url);
        self.store.create_application(&app).await?;

        info!("Created application: {} ({})", app.name, app.id);
        Ok(app)
    }

    pub async fn get_application(&self, id: Uuid) -> Result<Application> {
        self.store.get_application(id).await
    }

    pub async fn get_deploy(&self, id: Uuid) -> Result<Deploy> {
        self.store.get_deploy(id).await
    }

    pub async fn get_application_logs(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        self.store.get_application_logs(id).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}
