use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::forms::{self, FieldKind};
use crate::store::move_item;

use super::{apply_config, ApiError, AppState, Reorder};

// Shown in the outbound select when the config has no outbounds yet.
const FALLBACK_OUTBOUNDS: [&str; 3] = ["direct", "block", "dns-out"];

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(state.store.get_rules()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !rule.is_object() {
        return Err(ApiError::bad_request("rule must be a JSON object"));
    }
    let mut rules = state.store.get_rules()?;
    rules.push(rule);
    state.store.update_rules(rules)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(rule): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !rule.is_object() {
        return Err(ApiError::bad_request("rule must be a JSON object"));
    }
    let mut rules = state.store.get_rules()?;
    let slot = rules
        .get_mut(index)
        .ok_or_else(|| ApiError::not_found(format!("no rule at index {index}")))?;
    *slot = rule;
    state.store.update_rules(rules)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<Value>, ApiError> {
    let mut rules = state.store.get_rules()?;
    if index >= rules.len() {
        return Err(ApiError::not_found(format!("no rule at index {index}")));
    }
    rules.remove(index);
    state.store.update_rules(rules)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Reorder>,
) -> Result<Json<Value>, ApiError> {
    let mut rules = state.store.get_rules()?;
    if !move_item(&mut rules, req.from, req.to) {
        return Err(ApiError::bad_request(format!(
            "reorder indices out of range: {} -> {}",
            req.from, req.to
        )));
    }
    state.store.update_rules(rules)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    index: Option<usize>,
}

/// Build a rule form. With `index`, the form is pre-filled from the
/// existing rule and the kind is inferred from its shape unless given
/// explicitly.
pub async fn form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FormQuery>,
) -> Result<Json<Value>, ApiError> {
    let rules = state.store.get_rules()?;
    let existing = match query.index {
        Some(index) => Some(
            rules
                .get(index)
                .and_then(Value::as_object)
                .ok_or_else(|| ApiError::not_found(format!("no rule at index {index}")))?,
        ),
        None => None,
    };

    let kind = match query.kind.as_deref() {
        Some(kind) if !kind.is_empty() => kind.to_string(),
        _ => match existing {
            Some(rule) => forms::detect_rule_kind(rule).to_string(),
            None => "default-rule".to_string(),
        },
    };

    let mut form =
        forms::build_rule_form(&kind).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut tags = state.store.outbound_tags()?;
    if tags.is_empty() {
        tags = FALLBACK_OUTBOUNDS.iter().map(|s| s.to_string()).collect();
    }
    if let Some(field) = form.field_mut("outbound") {
        field.kind = FieldKind::Select;
        field.options = tags;
    }

    if let Some(rule) = existing {
        forms::populate(&mut form, rule);
    }

    Ok(Json(json!({
        "kinds": forms::available_rule_kinds(),
        "form": form,
    })))
}
