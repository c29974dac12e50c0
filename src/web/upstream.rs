use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clash::{format_api_url, test_connection};

use super::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ShowQuery {
    #[serde(default)]
    include_secret: bool,
}

/// Current upstream endpoint. The secret is masked unless explicitly
/// requested.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShowQuery>,
) -> Json<Value> {
    let upstream = state.upstream.read().await;
    let secret = match &upstream.secret {
        Some(s) if query.include_secret => json!(s),
        Some(_) => json!("********"),
        None => Value::Null,
    };

    Json(json!({
        "url": upstream.url,
        "secret": secret,
        "connected": upstream.client.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpstreamPayload {
    url: String,
    #[serde(default)]
    secret: Option<String>,
}

pub async fn test(Json(req): Json<UpstreamPayload>) -> Result<Json<Value>, ApiError> {
    let url = format_api_url(&req.url);
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    test_connection(&url, req.secret.as_deref())
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Point the admin at a different Clash API endpoint. The endpoint is
/// verified before the switch; persisting it is best effort.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpstreamPayload>,
) -> Result<Json<Value>, ApiError> {
    let url = format_api_url(&req.url);
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    let secret = req.secret.filter(|s| !s.is_empty());

    // An endpoint that does not answer is a rejected submission, not a
    // server fault.
    test_connection(&url, secret.as_deref())
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    state.set_upstream(url.clone(), secret.clone()).await;
    info!("upstream API set to {url}");

    {
        let mut settings = state.settings.lock().await;
        settings.api_url = Some(url.clone());
        settings.secret = secret;
        if let Err(e) = settings.save() {
            warn!("failed to persist settings: {e}");
        }
    }

    Ok(Json(json!({ "status": "ok", "url": url })))
}
