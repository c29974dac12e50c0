use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::forms::{self, available_outbound_types, outbound_form_fields, requires_server};
use crate::store::move_item;

use super::{apply_config, ApiError, AppState, Reorder};

fn validate(outbound: &Map<String, Value>) -> Result<(), ApiError> {
    let outbound_type = outbound
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("outbound requires a 'type' field"))?;
    if !available_outbound_types()
        .iter()
        .any(|t| t.value == outbound_type)
    {
        return Err(ApiError::bad_request(format!(
            "unknown outbound type: {outbound_type}"
        )));
    }

    if outbound
        .get("tag")
        .and_then(Value::as_str)
        .unwrap_or("")
        .is_empty()
    {
        return Err(ApiError::bad_request("outbound requires a non-empty tag"));
    }

    if requires_server(outbound_type) {
        if outbound
            .get("server")
            .and_then(Value::as_str)
            .unwrap_or("")
            .is_empty()
        {
            return Err(ApiError::bad_request(format!(
                "{outbound_type} outbound requires a server"
            )));
        }
        if outbound.get("server_port").and_then(Value::as_u64).is_none() {
            return Err(ApiError::bad_request(format!(
                "{outbound_type} outbound requires a server_port"
            )));
        }
    }

    if matches!(outbound_type, "selector" | "urltest") {
        let empty = outbound
            .get("outbounds")
            .and_then(Value::as_array)
            .map_or(true, |members| members.is_empty());
        if empty {
            return Err(ApiError::bad_request(format!(
                "{outbound_type} outbound requires at least one member"
            )));
        }
    }

    Ok(())
}

fn tag_of(outbound: &Value) -> Option<&str> {
    outbound.get("tag").and_then(Value::as_str)
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(state.store.get_outbounds()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(outbound): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let map = outbound
        .as_object()
        .ok_or_else(|| ApiError::bad_request("outbound must be a JSON object"))?;
    validate(map)?;

    let tag = map.get("tag").and_then(Value::as_str).unwrap_or("");
    let mut outbounds = state.store.get_outbounds()?;
    if outbounds.iter().any(|o| tag_of(o) == Some(tag)) {
        return Err(ApiError::bad_request(format!(
            "an outbound tagged '{tag}' already exists"
        )));
    }

    outbounds.push(outbound);
    state.store.update_outbounds(outbounds)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

/// Replace an outbound, addressed by its tag before the edit. A changed
/// tag cascades to group members, selector defaults, rules and the route
/// final target.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    Json(outbound): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let map = outbound
        .as_object()
        .ok_or_else(|| ApiError::bad_request("outbound must be a JSON object"))?;
    validate(map)?;
    let new_tag = map
        .get("tag")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut outbounds = state.store.get_outbounds()?;
    let index = outbounds
        .iter()
        .position(|o| tag_of(o) == Some(tag.as_str()))
        .ok_or_else(|| ApiError::not_found(format!("no outbound tagged '{tag}'")))?;
    if new_tag != tag
        && outbounds
            .iter()
            .any(|o| tag_of(o) == Some(new_tag.as_str()))
    {
        return Err(ApiError::bad_request(format!(
            "an outbound tagged '{new_tag}' already exists"
        )));
    }

    outbounds[index] = outbound;
    state.store.update_outbounds(outbounds)?;
    if new_tag != tag {
        state.store.rename_outbound(&tag, &new_tag)?;
    }
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

/// Delete an outbound and scrub it from group member lists. A selector
/// whose default pointed at the deleted outbound falls back to its first
/// remaining member.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut outbounds = state.store.get_outbounds()?;
    let index = outbounds
        .iter()
        .position(|o| tag_of(o) == Some(tag.as_str()))
        .ok_or_else(|| ApiError::not_found(format!("no outbound tagged '{tag}'")))?;
    outbounds.remove(index);

    for outbound in outbounds.iter_mut() {
        let Some(map) = outbound.as_object_mut() else {
            continue;
        };
        let mut first_member = None;
        if let Some(members) = map.get_mut("outbounds").and_then(Value::as_array_mut) {
            members.retain(|m| m.as_str() != Some(tag.as_str()));
            first_member = members.first().and_then(Value::as_str).map(String::from);
        }
        if map.get("default").and_then(Value::as_str) == Some(tag.as_str()) {
            match first_member {
                Some(member) => {
                    map.insert("default".to_string(), Value::String(member));
                }
                None => {
                    map.remove("default");
                }
            }
        }
    }

    state.store.update_outbounds(outbounds)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Reorder>,
) -> Result<Json<Value>, ApiError> {
    let mut outbounds = state.store.get_outbounds()?;
    if !move_item(&mut outbounds, req.from, req.to) {
        return Err(ApiError::bad_request(format!(
            "reorder indices out of range: {} -> {}",
            req.from, req.to
        )));
    }
    state.store.update_outbounds(outbounds)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
pub struct Rename {
    old_tag: String,
    new_tag: String,
}

pub async fn rename(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Rename>,
) -> Result<Json<Value>, ApiError> {
    if req.old_tag.is_empty() || req.new_tag.is_empty() {
        return Err(ApiError::bad_request("old_tag and new_tag are required"));
    }
    if req.old_tag == req.new_tag {
        return Ok(Json(json!({ "status": "ok" })));
    }

    let tags = state.store.outbound_tags()?;
    if !tags.iter().any(|t| t == &req.old_tag) {
        return Err(ApiError::not_found(format!(
            "no outbound tagged '{}'",
            req.old_tag
        )));
    }
    if tags.iter().any(|t| t == &req.new_tag) {
        return Err(ApiError::bad_request(format!(
            "an outbound tagged '{}' already exists",
            req.new_tag
        )));
    }

    state.store.rename_outbound(&req.old_tag, &req.new_tag)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    #[serde(default, rename = "type")]
    outbound_type: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

/// Build an outbound form. With `tag`, the form is pre-filled from the
/// existing outbound and the type is read from it unless given explicitly.
pub async fn form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FormQuery>,
) -> Result<Json<Value>, ApiError> {
    let outbounds = state.store.get_outbounds()?;
    let existing = match query.tag.as_deref() {
        Some(tag) if !tag.is_empty() => Some(
            outbounds
                .iter()
                .find(|o| tag_of(o) == Some(tag))
                .and_then(Value::as_object)
                .ok_or_else(|| ApiError::not_found(format!("no outbound tagged '{tag}'")))?,
        ),
        _ => None,
    };

    let outbound_type = match query.outbound_type.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => existing
            .and_then(|o| o.get("type").and_then(Value::as_str))
            .unwrap_or("direct")
            .to_string(),
    };
    if !available_outbound_types()
        .iter()
        .any(|t| t.value == outbound_type)
    {
        return Err(ApiError::bad_request(format!(
            "unknown outbound type: {outbound_type}"
        )));
    }

    let tags = state.store.outbound_tags()?;
    let fields = outbound_form_fields(&outbound_type, &tags);
    let mut form = crate::forms::FormDefinition {
        name: outbound_type.clone(),
        title: format!("{} Outbound", outbound_type),
        fields,
    };
    if let Some(existing) = existing {
        forms::populate(&mut form, existing);
    }

    Ok(Json(json!({
        "types": available_outbound_types(),
        "form": form,
    })))
}

/// Members and candidates of a selector/urltest group.
pub async fn group(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let outbounds = state.store.get_outbounds()?;
    let entry = outbounds
        .iter()
        .find(|o| tag_of(o) == Some(tag.as_str()))
        .ok_or_else(|| ApiError::not_found(format!("no outbound tagged '{tag}'")))?;

    let outbound_type = entry.get("type").and_then(Value::as_str).unwrap_or("");
    if !matches!(outbound_type, "selector" | "urltest") {
        return Err(ApiError::bad_request(format!(
            "'{tag}' is not a group outbound"
        )));
    }

    let members: Vec<&str> = entry
        .get("outbounds")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let candidates: Vec<&str> = outbounds
        .iter()
        .filter_map(tag_of)
        .filter(|t| *t != tag)
        .collect();

    Ok(Json(json!({
        "tag": tag,
        "type": outbound_type,
        "members": members,
        "default": entry.get("default"),
        "candidates": candidates,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GroupUpdate {
    outbounds: Vec<String>,
    #[serde(default)]
    default: Option<String>,
}

pub async fn update_group(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    Json(req): Json<GroupUpdate>,
) -> Result<Json<Value>, ApiError> {
    if req.outbounds.is_empty() {
        return Err(ApiError::bad_request("group requires at least one member"));
    }
    if let Some(default) = &req.default {
        if !req.outbounds.contains(default) {
            return Err(ApiError::bad_request(
                "default must be one of the group members",
            ));
        }
    }

    let mut outbounds = state.store.get_outbounds()?;
    let known: Vec<String> = outbounds
        .iter()
        .filter_map(|o| tag_of(o).map(String::from))
        .collect();
    for member in &req.outbounds {
        if member == &tag {
            return Err(ApiError::bad_request("group cannot contain itself"));
        }
        if !known.contains(member) {
            return Err(ApiError::bad_request(format!(
                "unknown group member: '{member}'"
            )));
        }
    }

    let entry = outbounds
        .iter_mut()
        .find(|o| tag_of(o) == Some(tag.as_str()))
        .ok_or_else(|| ApiError::not_found(format!("no outbound tagged '{tag}'")))?;
    let map = entry
        .as_object_mut()
        .ok_or_else(|| ApiError::internal("outbound entry is not an object"))?;
    if !matches!(
        map.get("type").and_then(Value::as_str),
        Some("selector") | Some("urltest")
    ) {
        return Err(ApiError::bad_request(format!(
            "'{tag}' is not a group outbound"
        )));
    }

    map.insert(
        "outbounds".to_string(),
        Value::Array(req.outbounds.iter().map(|m| json!(m)).collect()),
    );
    match req.default {
        Some(default) => {
            map.insert("default".to_string(), Value::String(default));
        }
        None => {
            map.remove("default");
        }
    }

    state.store.update_outbounds(outbounds)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}
