//! API request handlers for the control plane
//!
//! Each handler decodes its request, calls exactly one [`ControlPlane`]
//! operation, and encodes the result.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fnhost_common::{Application, Deploy, Error, LogEntry};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::service::ControlPlane;

/// Shared application state
pub struct AppState {
    pub plane: ControlPlane,

    /// Largest accepted deploy body, in bytes
    pub max_deploy_bytes: usize,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::ApplicationNotFound(_) | Error::DeployNotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Store(_)
            | Error::Activation { .. }
            | Error::Cache(_)
            | Error::JsonSerialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    ApiError {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )*
    };
}

impl_from_rejection!(JsonRejection, PathRejection, BytesRejection);

/// Request to create a new application
#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Request to roll an application back to one of its deploys
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub deploy_id: Uuid,
}

/// Response from a rollback
#[derive(Debug, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub deploy: Uuid,
}

/// Health check endpoint
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.plane.health_check().await?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "service": "control-plane"
    })))
}

/// Create a new application
pub async fn create_application_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateApplicationRequest>, JsonRejection>,
) -> Result<Json<Application>, ApiError> {
    let Json(payload) = payload?;
    info!("Creating application: {}", payload.name);

    let app = state
        .plane
        .create_application(payload.name, payload.environment)
        .await?;

    Ok(Json(app))
}

/// Get application by ID
pub async fn get_application_handler(
    State(state): State<Arc<AppState>>,
    app_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Application>, ApiError> {
    let Path(app_id) = app_id?;
    info!("Getting application: {}", app_id);

    let app = state.plane.get_application(app_id).await?;
    Ok(Json(app))
}

/// Upload a new deploy; the raw request body is the payload
pub async fn create_deploy_handler(
    State(state): State<Arc<AppState>>,
    app_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Deploy>, ApiError> {
    let Path(app_id) = app_id?;
    let body = body?;
    info!(
        "Creating deploy for application: {} ({} bytes)",
        app_id,
        body.len()
    );

    let deploy = state.plane.create_deploy(app_id, body.to_vec()).await?;
    Ok(Json(deploy))
}

/// Roll an application back to an earlier deploy
pub async fn rollback_handler(
    State(state): State<Arc<AppState>>,
    app_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RollbackRequest>, JsonRejection>,
) -> Result<Json<RollbackResponse>, ApiError> {
    let Path(app_id) = app_id?;
    let Json(payload) = payload?;
    info!(
        "Rolling back application: {} to deploy: {}",
        app_id, payload.deploy_id
    );

    let deploy = state.plane.rollback(app_id, payload.deploy_id).await?;
    Ok(Json(RollbackResponse { deploy }))
}

/// Get runtime logs of an application
pub async fn get_logs_handler(
    State(state): State<Arc<AppState>>,
    app_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let Path(app_id) = app_id?;
    info!("Getting logs for application: {}", app_id);

    let logs = state.plane.get_application_logs(app_id).await?;
    Ok(Json(logs))
}

/// Get deploy by ID
pub async fn get_deploy_handler(
    State(state): State<Arc<AppState>>,
    deploy_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Deploy>, ApiError> {
    let Path(deploy_id) = deploy_id?;
    info!("Getting deploy: {}", deploy_id);

    let deploy = state.plane.get_deploy(deploy_id).await?;
    Ok(Json(deploy))
}
