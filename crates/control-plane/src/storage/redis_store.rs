//! Redis storage for applications, deploys and logs
//!
//! Data model:
//! - application:{id} → application JSON (fields fixed at creation)
//! - application:{id}:active_deploy → id of the live deploy
//! - application:{id}:logs → list of log entry JSON, oldest first
//! - deploy:{id} → deploy JSON
//!
//! The active deploy pointer lives in its own key so that re-pointing is a
//! single-key write. Both pointer writes go through Lua scripts, which Redis
//! runs atomically, so the existence check, the read of the previous value
//! and the write cannot interleave with another client.

use anyhow::Context;
use async_trait::async_trait;
use fnhost_common::{Application, Deploy, Error, LogEntry, Result, UpdateApplication};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};
use uuid::Uuid;

use super::Store;

const UPDATE_ACTIVE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return {0, ''}
end
local previous = redis.call('GET', KEYS[2])
redis.call('SET', KEYS[2], ARGV[1])
return {1, previous or ''}
";

const CREATE_AND_ACTIVATE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return {0, ''}
end
if redis.call('SETNX', KEYS[2], ARGV[1]) == 0 then
    return {-1, ''}
end
local previous = redis.call('GET', KEYS[3])
redis.call('SET', KEYS[3], ARGV[2])
return {1, previous or ''}
";

fn application_key(id: Uuid) -> String {
    format!("application:{}", id)
}

fn active_deploy_key(id: Uuid) -> String {
    format!("application:{}:active_deploy", id)
}

fn logs_key(id: Uuid) -> String {
    format!("application:{}:logs", id)
}

fn deploy_key(id: Uuid) -> String {
    format!("deploy:{}", id)
}

fn store_err(err: redis::RedisError) -> Error {
    Error::Store(err.to_string())
}

fn parse_deploy_id(raw: &str) -> Result<Option<Uuid>> {
    if raw.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|e| Error::Store(format!("corrupt active deploy id {raw:?}: {e}")))
}

/// Redis-backed [`Store`]
pub struct RedisStore {
    conn: ConnectionManager,
    update_active: Script,
    create_and_activate: Script,
}

impl RedisStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)
            .context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            update_active: Script::new(UPDATE_ACTIVE_SCRIPT),
            create_and_activate: Script::new(CREATE_AND_ACTIVATE_SCRIPT),
        })
    }

    // ConnectionManager is a cheap handle onto one multiplexed connection.
    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn ensure_application(&self, id: Uuid) -> Result<()> {
        let exists: bool = self
            .conn()
            .exists(application_key(id))
            .await
            .map_err(store_err)?;
        if !exists {
            return Err(Error::ApplicationNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn create_application(&self, app: &Application) -> Result<()> {
        let mut conn = self.conn();

        let base = Application {
            active_deploy_id: None,
            ..app.clone()
        };
        let json = serde_json::to_string(&base)?;

        let created: bool = conn
            .set_nx(application_key(app.id), json)
            .await
            .map_err(store_err)?;
        if !created {
            debug!("Application already exists: {}", app.id);
            return Err(Error::Conflict(format!("application already exists: {}", app.id)));
        }

        if let Some(deploy_id) = app.active_deploy_id {
            let _: () = conn
                .set(active_deploy_key(app.id), deploy_id.to_string())
                .await
                .map_err(store_err)?;
        }

        info!("Stored application: {}", app.id);
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> Result<Application> {
        let mut conn = self.conn();

        let (json, active): (Option<String>, Option<String>) = redis::pipe()
            .get(application_key(id))
            .get(active_deploy_key(id))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        let json = json.ok_or(Error::ApplicationNotFound(id))?;
        let mut app: Application = serde_json::from_str(&json)?;
        app.active_deploy_id = match active {
            Some(raw) => parse_deploy_id(&raw)?,
            None => None,
        };

        Ok(app)
    }

    async fn update_application(
        &self,
        id: Uuid,
        params: UpdateApplication,
    ) -> Result<Option<Uuid>> {
        let mut conn = self.conn();

        let (status, previous): (i64, String) = self
            .update_active
            .key(application_key(id))
            .key(active_deploy_key(id))
            .arg(params.active_deploy_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        if status == 0 {
            return Err(Error::ApplicationNotFound(id));
        }

        debug!(
            "Application {} now points at deploy {}",
            id, params.active_deploy_id
        );
        parse_deploy_id(&previous)
    }

    async fn create_deploy(&self, deploy: &Deploy) -> Result<()> {
        let json = serde_json::to_string(deploy)?;

        let created: bool = self
            .conn()
            .set_nx(deploy_key(deploy.id), json)
            .await
            .map_err(store_err)?;
        if !created {
            return Err(Error::Conflict(format!("deploy already exists: {}", deploy.id)));
        }

        info!(
            "Stored deploy: {} for application: {}",
            deploy.id, deploy.application_id
        );
        Ok(())
    }

    async fn get_deploy(&self, id: Uuid) -> Result<Deploy> {
        let json: Option<String> = self
            .conn()
            .get(deploy_key(id))
            .await
            .map_err(store_err)?;

        match json {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(Error::DeployNotFound(id)),
        }
    }

    async fn get_application_logs(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        self.ensure_application(id).await?;

        let lines: Vec<String> = self
            .conn()
            .lrange(logs_key(id), 0, -1)
            .await
            .map_err(store_err)?;

        lines
            .iter()
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        self.ensure_application(entry.application_id).await?;

        let json = serde_json::to_string(entry)?;
        let _: () = self
            .conn()
            .rpush(logs_key(entry.application_id), json)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn create_deploy_and_activate(&self, deploy: &Deploy) -> Result<Option<Uuid>> {
        let mut conn = self.conn();
        let json = serde_json::to_string(deploy)?;

        let (status, previous): (i64, String) = self
            .create_and_activate
            .key(application_key(deploy.application_id))
            .key(deploy_key(deploy.id))
            .key(active_deploy_key(deploy.application_id))
            .arg(json)
            .arg(deploy.id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        match status {
            0 => Err(Error::ApplicationNotFound(deploy.application_id)),
            -1 => Err(Error::Conflict(format!("deploy already exists: {}", deploy.id))),
            _ => {
                info!(
                    "Stored and activated deploy: {} for application: {}",
                    deploy.id, deploy.application_id
                );
                parse_deploy_id(&previous)
            }
        }
    }
}
