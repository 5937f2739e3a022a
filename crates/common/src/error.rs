use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("application not found: {0}")]
    ApplicationNotFound(Uuid),

    #[error("deploy not found: {0}")]
    DeployNotFound(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),

    /// The deploy was persisted but the application still points elsewhere.
    #[error("deploy {deploy_id} was created but could not be activated: {reason}")]
    Activation { deploy_id: Uuid, reason: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
