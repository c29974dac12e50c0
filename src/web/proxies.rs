use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{ApiError, AppState};

/// Switchable proxy groups with per-member latency, sorted by name.
pub async fn groups(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let client = state.clash().await?;
    let proxies = client.get_proxies().await?;

    let mut groups: Vec<Value> = Vec::new();
    for (name, proxy) in &proxies {
        if !proxy.proxy_type.can_switch() {
            continue;
        }
        let members: Vec<Value> = proxy
            .all
            .iter()
            .flatten()
            .map(|member| {
                let delay = proxies.get(member).and_then(|p| p.last_delay());
                json!({ "name": member, "delay": delay })
            })
            .collect();
        groups.push(json!({
            "name": name,
            "type": proxy.proxy_type,
            "now": proxy.now,
            "proxies": members,
        }));
    }
    groups.sort_by(|a, b| {
        a.get("name")
            .and_then(Value::as_str)
            .cmp(&b.get("name").and_then(Value::as_str))
    });

    Ok(Json(json!({ "groups": groups })))
}

#[derive(Debug, Deserialize)]
pub struct Switch {
    group: String,
    proxy: String,
}

pub async fn switch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Switch>,
) -> Result<Json<Value>, ApiError> {
    let client = state.clash().await?;
    client.select_proxy(&req.group, &req.proxy).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
pub struct DelayTest {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    timeout: Option<u32>,
}

/// Test one proxy's latency. Failures come back in the body rather than
/// as an error status so a timed-out node renders alongside working ones.
pub async fn delay(
    State(state): State<Arc<AppState>>,
    Query(req): Query<DelayTest>,
) -> Result<Json<Value>, ApiError> {
    let client = state.clash().await?;
    let result = client
        .test_delay(&req.name, req.url.as_deref(), req.timeout)
        .await;

    Ok(Json(match result {
        Ok(delay) => json!({ "proxy": req.name, "delay": delay }),
        Err(e) => json!({ "proxy": req.name, "error": e.to_string() }),
    }))
}

#[derive(Debug, Deserialize)]
pub struct GroupDelayTest {
    group: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    timeout: Option<u32>,
}

/// Test every member of a group in turn. One slow or dead member never
/// aborts the batch.
pub async fn group_delay(
    State(state): State<Arc<AppState>>,
    Query(req): Query<GroupDelayTest>,
) -> Result<Json<Value>, ApiError> {
    let client = state.clash().await?;
    let group = client.get_proxy(&req.group).await?;
    let members = group.all.unwrap_or_default();

    let mut outcomes = Vec::with_capacity(members.len());
    for member in members {
        let result = client
            .test_delay(&member, req.url.as_deref(), req.timeout)
            .await;
        outcomes.push((member, result));
    }
    let results = collect_delay_results(outcomes);

    Ok(Json(json!({ "group": req.group, "results": results })))
}

/// One entry per member; a failed test records its error in place of a
/// latency.
fn collect_delay_results<I>(outcomes: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, anyhow::Result<u32>)>,
{
    outcomes
        .into_iter()
        .map(|(member, result)| {
            let entry = match result {
                Ok(delay) => json!({ "delay": delay }),
                Err(e) => json!({ "error": e.to_string() }),
            };
            (member, entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keeps_one_entry_per_member_when_one_fails() {
        let outcomes: Vec<(String, anyhow::Result<u32>)> = vec![
            ("fast".to_string(), Ok(42)),
            ("dead".to_string(), Err(anyhow::anyhow!("timeout"))),
            ("slow".to_string(), Ok(900)),
        ];

        let results = collect_delay_results(outcomes);

        assert_eq!(results.len(), 3);
        assert_eq!(results["fast"]["delay"], 42);
        assert_eq!(results["slow"]["delay"], 900);
        assert_eq!(results["dead"]["error"], "timeout");
        assert!(results["dead"].get("delay").is_none());
    }
}
