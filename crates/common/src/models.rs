//! Data models shared by the control plane and its storage backends

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Shortest accepted application name, in bytes (inclusive)
pub const MIN_APP_NAME_LEN: usize = 3;

/// Longest accepted application name, in bytes (inclusive)
pub const MAX_APP_NAME_LEN: usize = 20;

/// A deployable unit and its pointer to the live deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Unique application identifier
    pub id: Uuid,

    /// Human readable label
    pub name: String,

    /// Environment handed to the function at runtime
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Public URL the function is served on
    pub endpoint: String,

    /// Deploy currently serving traffic, unset until the first deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deploy_id: Option<Uuid>,

    /// When this application was created
    pub created_at: DateTime<Utc>,
}

impl Application {
    /// Create a new application with a fresh id and no active deploy.
    ///
    /// The endpoint is derived from `function_base_url` and the new id and is
    /// never recomputed afterwards.
    pub fn new(
        name: String,
        environment: HashMap<String, String>,
        function_base_url: &str,
    ) -> Self {
        let id = Uuid::new_v4();
        let endpoint = format!("{}/{}", function_base_url.trim_end_matches('/'), id);

        Self {
            id,
            name,
            environment,
            endpoint,
            active_deploy_id: None,
            created_at: Utc::now(),
        }
    }
}

/// An immutable build artifact belonging to exactly one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    /// Unique deploy identifier
    pub id: Uuid,

    /// Owning application
    pub application_id: Uuid,

    /// Build artifact as uploaded
    #[serde(with = "crate::payload")]
    pub payload: Vec<u8>,

    /// When this deploy was created
    pub created_at: DateTime<Utc>,
}

impl Deploy {
    /// Create a new deploy for `application_id`
    pub fn new(application_id: Uuid, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Mutable fields of an application.
///
/// Everything else on [`Application`] is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateApplication {
    pub active_deploy_id: Uuid,
}

/// A line of runtime output produced by a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub application_id: Uuid,
    pub deploy_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(application_id: Uuid, deploy_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            application_id,
            deploy_id,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Inclusive bounds on application name length, counted in UTF-8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for NameBounds {
    fn default() -> Self {
        Self {
            min: MIN_APP_NAME_LEN,
            max: MAX_APP_NAME_LEN,
        }
    }
}

impl NameBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Rejection message, rendered from the same bounds that are enforced
    pub fn message(&self) -> String {
        format!(
            "name of the application should be between {} and {} characters",
            self.min, self.max
        )
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let len = name.len();
        if len < self.min || len > self.max {
            return Err(Error::Validation(self.message()));
        }
        Ok(())
    }
}
