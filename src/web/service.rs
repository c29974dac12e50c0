use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::service::ServiceStatus;

use super::{ApiError, AppState};

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<ServiceStatus>, ApiError> {
    Ok(Json(state.service.status().await?))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_lines")]
    lines: u32,
}

fn default_lines() -> u32 {
    50
}

pub async fn logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, ApiError> {
    let logs = state.service.logs(query.lines).await?;
    Ok(Json(json!({ "logs": logs })))
}

pub async fn control(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match action.as_str() {
        "start" => state.service.start().await?,
        "stop" => state.service.stop().await?,
        "restart" => state.service.restart().await?,
        "reload" => state.service.reload().await?,
        "enable" => state.service.enable().await?,
        "disable" => state.service.disable().await?,
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown service action: {other}"
            )))
        }
    }
    Ok(Json(json!({ "status": "ok" })))
}
