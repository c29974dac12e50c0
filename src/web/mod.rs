mod actions;
mod backups;
mod connections;
mod outbounds;
mod pages;
mod proxies;
mod rules;
mod service;
mod upstream;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::clash::ClashClient;
use crate::config::AppConfig;
use crate::service::{ServiceController, ServiceError};
use crate::store::{ConfigStore, StoreError};

/// Upstream Clash API endpoint. Swappable at runtime from the settings
/// page, so handlers take a read lock for the duration of each call.
#[derive(Default)]
pub struct Upstream {
    pub url: String,
    pub secret: Option<String>,
    pub client: Option<ClashClient>,
}

/// Shared state behind every handler
pub struct AppState {
    pub store: ConfigStore,
    pub service: ServiceController,
    pub upstream: RwLock<Upstream>,
    pub settings: Mutex<AppConfig>,
}

impl AppState {
    pub fn new(store: ConfigStore, service: ServiceController, settings: AppConfig) -> Self {
        Self {
            store,
            service,
            upstream: RwLock::new(Upstream::default()),
            settings: Mutex::new(settings),
        }
    }

    /// Install a new upstream endpoint and build its client.
    pub async fn set_upstream(&self, url: String, secret: Option<String>) {
        let client = ClashClient::new(url.clone(), secret.clone());
        let mut upstream = self.upstream.write().await;
        upstream.url = url;
        upstream.secret = secret;
        upstream.client = Some(client);
    }

    async fn clash(&self) -> Result<ClashClient, ApiError> {
        let upstream = self.upstream.read().await;
        upstream
            .client
            .clone()
            .ok_or_else(|| ApiError::internal("no upstream API configured"))
    }
}

/// Error envelope for JSON endpoints
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::Restore { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::internal(e.to_string())
    }
}

// Upstream API failures surface as server errors, like store and
// service failures.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::internal(e.to_string())
    }
}

/// Reorder request used by the drag-and-drop endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct Reorder {
    pub from: usize,
    pub to: usize,
}

/// Ask the service to pick up a config change. Best effort: the edit has
/// already been persisted, so a reload failure is logged and the request
/// still succeeds.
pub(crate) async fn apply_config(state: &AppState) {
    if let Err(e) = state.service.reload().await {
        warn!("service reload failed: {e}");
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/rules", get(pages::rules))
        .route("/outbounds", get(pages::outbounds))
        .route("/rule-actions", get(pages::rule_actions))
        .route("/connections", get(pages::connections))
        .route("/proxies", get(pages::proxies))
        .route("/service", get(pages::service))
        .route("/backups", get(pages::backups))
        .route("/api/rules", get(rules::list).post(rules::create))
        .route("/api/rules/form", get(rules::form))
        .route("/api/rules/reorder", post(rules::reorder))
        .route("/api/rules/:index", put(rules::update).delete(rules::remove))
        .route("/api/rule-actions", get(actions::list).post(actions::create))
        .route("/api/rule-actions/form", get(actions::form))
        .route("/api/rule-actions/reorder", post(actions::reorder))
        .route(
            "/api/rule-actions/:index",
            put(actions::update).delete(actions::remove),
        )
        .route("/api/outbounds", get(outbounds::list).post(outbounds::create))
        .route("/api/outbounds/form", get(outbounds::form))
        .route("/api/outbounds/reorder", post(outbounds::reorder))
        .route("/api/outbounds/rename", post(outbounds::rename))
        .route(
            "/api/outbounds/:tag",
            put(outbounds::update).delete(outbounds::remove),
        )
        .route(
            "/api/outbounds/:tag/group",
            get(outbounds::group).post(outbounds::update_group),
        )
        .route("/api/service/status", get(service::status))
        .route("/api/service/logs", get(service::logs))
        .route("/api/service/:action", post(service::control))
        .route("/api/config", get(backups::config).put(backups::replace))
        .route("/api/config/export", get(backups::export))
        .route(
            "/api/config/backups",
            get(backups::list).post(backups::create),
        )
        .route("/api/config/restore", post(backups::restore))
        .route("/api/proxies/groups", get(proxies::groups))
        .route("/api/proxies/switch", post(proxies::switch))
        .route("/api/proxies/delay-test", get(proxies::delay))
        .route("/api/proxies/group-delay-test", get(proxies::group_delay))
        .route("/api/upstream", get(upstream::show).post(upstream::update))
        .route("/api/upstream/test", post(upstream::test))
        .route("/ws/connections", get(connections::ws))
        .route(
            "/api/connections/create-rule",
            post(connections::create_rule),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failures_map_to_server_errors() {
        let err = ApiError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_restore_maps_to_bad_request() {
        let err = ApiError::from(StoreError::Restore {
            name: "broken.json".to_string(),
            reason: "invalid JSON".to_string(),
        });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
