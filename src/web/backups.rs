use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::{BackupInfo, Config};

use super::{apply_config, ApiError, AppState};

pub async fn config(State(state): State<Arc<AppState>>) -> Result<Json<Config>, ApiError> {
    Ok(Json(state.store.load()?))
}

/// Replace the whole configuration document.
pub async fn replace(
    State(state): State<Arc<AppState>>,
    Json(config): Json<Config>,
) -> Result<Json<Value>, ApiError> {
    state.store.save(&config)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

/// Download the current configuration as an attachment.
pub async fn export(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let config = state.store.load()?;
    let body = serde_json::to_string_pretty(&config)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let filename = format!(
        "sing-box-config-{}.json",
        Local::now().format("%Y%m%d-%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<BackupInfo>>, ApiError> {
    Ok(Json(state.store.list_backups()?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBackup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBackup>,
) -> Result<Json<Value>, ApiError> {
    let name = if req.name.trim().is_empty() {
        format!("Manual backup {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    } else {
        req.name.trim().to_string()
    };
    let description = if req.description.trim().is_empty() {
        "Manual backup created by user".to_string()
    } else {
        req.description.trim().to_string()
    };

    state.store.create_backup(&name, &description)?;
    Ok(Json(json!({ "status": "ok", "name": name })))
}

#[derive(Debug, Deserialize)]
pub struct Restore {
    backup: String,
}

pub async fn restore(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Restore>,
) -> Result<Json<Value>, ApiError> {
    state.store.restore_backup(&req.backup)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}
