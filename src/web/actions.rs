use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::forms;
use crate::store::move_item;

use super::{apply_config, ApiError, AppState, Reorder};

fn validate(action: &Value) -> Result<(), ApiError> {
    let map = action
        .as_object()
        .ok_or_else(|| ApiError::bad_request("rule action must be a JSON object"))?;
    let kind = map
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("rule action requires an 'action' field"))?;
    if !forms::available_actions().contains(&kind) {
        return Err(ApiError::bad_request(format!(
            "unknown action type: {kind}"
        )));
    }
    Ok(())
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(state.store.get_rule_actions()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(action): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    validate(&action)?;
    let mut actions = state.store.get_rule_actions()?;
    actions.push(action);
    state.store.update_rule_actions(actions)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(action): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    validate(&action)?;
    let mut actions = state.store.get_rule_actions()?;
    let slot = actions
        .get_mut(index)
        .ok_or_else(|| ApiError::not_found(format!("no rule action at index {index}")))?;
    *slot = action;
    state.store.update_rule_actions(actions)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<Value>, ApiError> {
    let mut actions = state.store.get_rule_actions()?;
    if index >= actions.len() {
        return Err(ApiError::not_found(format!(
            "no rule action at index {index}"
        )));
    }
    actions.remove(index);
    state.store.update_rule_actions(actions)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Reorder>,
) -> Result<Json<Value>, ApiError> {
    let mut actions = state.store.get_rule_actions()?;
    if !move_item(&mut actions, req.from, req.to) {
        return Err(ApiError::bad_request(format!(
            "reorder indices out of range: {} -> {}",
            req.from, req.to
        )));
    }
    state.store.update_rule_actions(actions)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    #[serde(default)]
    index: Option<usize>,
}

pub async fn form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FormQuery>,
) -> Result<Json<Value>, ApiError> {
    let tags = state.store.outbound_tags()?;
    let mut form = forms::rule_action_form(tags);

    if let Some(index) = query.index {
        let actions = state.store.get_rule_actions()?;
        let existing = actions
            .get(index)
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::not_found(format!("no rule action at index {index}")))?;
        forms::populate(&mut form, existing);
    }

    Ok(Json(json!({
        "actions": forms::available_actions(),
        "form": form,
    })))
}
