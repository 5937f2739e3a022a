//! In-memory store for development, tests and single-process deployments.
//!
//! Lock order is applications, then deploys, then logs. Every method that
//! takes more than one lock takes them in that order.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use fnhost_common::{Application, Deploy, Error, LogEntry, Result, UpdateApplication};
use tracing::debug;
use uuid::Uuid;

use super::Store;

/// An in-memory implementation of [`Store`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    applications: RwLock<HashMap<Uuid, Application>>,
    deploys: RwLock<HashMap<Uuid, Deploy>>,
    logs: RwLock<HashMap<Uuid, Vec<LogEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| Error::Store(format!("lock poisoned: {e}")))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| Error::Store(format!("lock poisoned: {e}")))
}

fn set_active(app: &mut Application, deploy_id: Uuid) -> Option<Uuid> {
    app.active_deploy_id.replace(deploy_id)
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_application(&self, app: &Application) -> Result<()> {
        let mut applications = write(&self.applications)?;
        if applications.contains_key(&app.id) {
            return Err(Error::Conflict(format!("application already exists: {}", app.id)));
        }

        applications.insert(app.id, app.clone());
        debug!("Stored application: {}", app.id);
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> Result<Application> {
        read(&self.applications)?
            .get(&id)
            .cloned()
            .ok_or(Error::ApplicationNotFound(id))
    }

    async fn update_application(
        &self,
        id: Uuid,
        params: UpdateApplication,
    ) -> Result<Option<Uuid>> {
        let mut applications = write(&self.applications)?;
        let app = applications
            .get_mut(&id)
            .ok_or(Error::ApplicationNotFound(id))?;

        Ok(set_active(app, params.active_deploy_id))
    }

    async fn create_deploy(&self, deploy: &Deploy) -> Result<()> {
        let mut deploys = write(&self.deploys)?;
        if deploys.contains_key(&deploy.id) {
            return Err(Error::Conflict(format!("deploy already exists: {}", deploy.id)));
        }

        deploys.insert(deploy.id, deploy.clone());
        debug!("Stored deploy: {}", deploy.id);
        Ok(())
    }

    async fn get_deploy(&self, id: Uuid) -> Result<Deploy> {
        read(&self.deploys)?
            .get(&id)
            .cloned()
            .ok_or(Error::DeployNotFound(id))
    }

    async fn get_application_logs(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        if !read(&self.applications)?.contains_key(&id) {
            return Err(Error::ApplicationNotFound(id));
        }

        Ok(read(&self.logs)?.get(&id).cloned().unwrap_or_default())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let applications = read(&self.applications)?;
        if !applications.contains_key(&entry.application_id) {
            return Err(Error::ApplicationNotFound(entry.application_id));
        }

        write(&self.logs)?
            .entry(entry.application_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn create_deploy_and_activate(&self, deploy: &Deploy) -> Result<Option<Uuid>> {
        let mut applications = write(&self.applications)?;
        let mut deploys = write(&self.deploys)?;

        let app = applications
            .get_mut(&deploy.application_id)
            .ok_or(Error::ApplicationNotFound(deploy.application_id))?;
        if deploys.contains_key(&deploy.id) {
            return Err(Error::Conflict(format!("deploy already exists: {}", deploy.id)));
        }

        deploys.insert(deploy.id, deploy.clone());
        let previous = set_active(app, deploy.id);

        debug!(
            "Stored and activated deploy: {} for application: {}",
            deploy.id, deploy.application_id
        );
        Ok(previous)
    }
}
