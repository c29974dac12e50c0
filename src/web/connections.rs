use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message as ClientMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::Message as UpstreamMessage;
use tracing::{debug, warn};

use super::{apply_config, ApiError, AppState};

/// Relay the upstream Clash connections stream to the browser. The
/// upstream socket carries the secret, so the browser never sees it.
pub async fn ws(
    State(state): State<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let (url, secret) = {
        let upstream = state.upstream.read().await;
        if upstream.url.is_empty() {
            return Err(ApiError::internal("no upstream API configured"));
        }
        (upstream.url.clone(), upstream.secret.clone())
    };

    let ws_url = connections_url(&url).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(upgrade.on_upgrade(move |socket| relay(socket, ws_url, secret)))
}

/// Derive the ws:// form of the API's /connections endpoint.
fn connections_url(api_url: &str) -> Result<String> {
    let mut url = url::Url::parse(api_url).context("invalid upstream API URL")?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("unsupported upstream URL scheme"))?;
    url.set_path("/connections");
    Ok(url.to_string())
}

fn build_request(ws_url: &str, secret: Option<&str>) -> Result<Request> {
    let mut request = ws_url
        .into_client_request()
        .context("invalid websocket URL")?;
    if let Some(secret) = secret {
        let value = format!("Bearer {secret}")
            .parse()
            .context("secret is not a valid header value")?;
        request.headers_mut().insert("Authorization", value);
    }
    Ok(request)
}

async fn relay(client: WebSocket, ws_url: String, secret: Option<String>) {
    let request = match build_request(&ws_url, secret.as_deref()) {
        Ok(request) => request,
        Err(e) => {
            warn!("connections relay setup failed: {e}");
            return;
        }
    };

    let (upstream, _) = match connect_async(request).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("failed to reach upstream connections socket: {e}");
            return;
        }
    };
    debug!("connections relay established to {ws_url}");

    let (mut upstream_tx, mut upstream_rx) = upstream.split();
    let (mut client_tx, mut client_rx) = client.split();

    let to_client = async {
        while let Some(message) = upstream_rx.next().await {
            let message = match message {
                Ok(m) => m,
                Err(_) => break,
            };
            let forwarded = match message {
                UpstreamMessage::Text(text) => ClientMessage::Text(text),
                UpstreamMessage::Binary(data) => ClientMessage::Binary(data),
                UpstreamMessage::Ping(data) => ClientMessage::Ping(data),
                UpstreamMessage::Pong(data) => ClientMessage::Pong(data),
                UpstreamMessage::Close(_) => break,
                UpstreamMessage::Frame(_) => continue,
            };
            if client_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    let to_upstream = async {
        while let Some(message) = client_rx.next().await {
            let message = match message {
                Ok(m) => m,
                Err(_) => break,
            };
            let forwarded = match message {
                ClientMessage::Text(text) => UpstreamMessage::Text(text),
                ClientMessage::Binary(data) => UpstreamMessage::Binary(data),
                ClientMessage::Ping(data) => UpstreamMessage::Ping(data),
                ClientMessage::Pong(data) => UpstreamMessage::Pong(data),
                ClientMessage::Close(_) => break,
            };
            if upstream_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    // Either side closing tears down the whole relay.
    tokio::select! {
        _ = to_client => {}
        _ = to_upstream => {}
    }
    debug!("connections relay closed");
}

#[derive(Debug, Deserialize)]
pub struct CreateRule {
    #[serde(default)]
    source_ip: Option<String>,
    #[serde(default)]
    destination_ip: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    network: Option<String>,
    action: String,
    #[serde(default)]
    outbound: Option<String>,
}

/// Build a routing rule from a live connection's attributes and prepend
/// it so it wins over existing rules.
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRule>,
) -> Result<Json<Value>, ApiError> {
    let mut rule = Map::new();

    if let Some(ip) = req.source_ip.as_deref().filter(|s| !s.is_empty()) {
        rule.insert("source_ip_cidr".to_string(), json!([host_cidr(ip)]));
    }
    if let Some(ip) = req.destination_ip.as_deref().filter(|s| !s.is_empty()) {
        rule.insert("ip_cidr".to_string(), json!([host_cidr(ip)]));
    }
    if let Some(domain) = req.domain.as_deref().filter(|s| !s.is_empty()) {
        rule.insert("domain_suffix".to_string(), json!([domain]));
    }
    if let Some(port) = req.port {
        rule.insert("port".to_string(), json!([port]));
    }
    if let Some(network) = req.network.as_deref().filter(|s| !s.is_empty()) {
        rule.insert("network".to_string(), json!(network));
    }
    if rule.is_empty() {
        return Err(ApiError::bad_request("no match criteria provided"));
    }

    match req.action.as_str() {
        "route" | "route-options" => {
            let outbound = req
                .outbound
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ApiError::bad_request("outbound is required for route actions")
                })?;
            let tags = state.store.outbound_tags()?;
            if !tags.iter().any(|t| t == outbound) {
                return Err(ApiError::bad_request(format!(
                    "unknown outbound: '{outbound}'"
                )));
            }
            rule.insert("action".to_string(), json!(req.action));
            rule.insert("outbound".to_string(), json!(outbound));
        }
        "reject" | "hijack-dns" | "sniff" | "resolve" => {
            rule.insert("action".to_string(), json!(req.action));
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown action type: {other}"
            )))
        }
    }

    let mut rules = state.store.get_rules()?;
    rules.insert(0, Value::Object(rule));
    state.store.update_rules(rules)?;
    apply_config(&state).await;
    Ok(Json(json!({ "status": "ok" })))
}

/// A bare address becomes a single-host CIDR; ranges pass through.
fn host_cidr(ip: &str) -> String {
    if ip.contains('/') {
        ip.to_string()
    } else if ip.contains(':') {
        format!("{ip}/128")
    } else {
        format!("{ip}/32")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_cidr_covers_v4_v6_and_ranges() {
        assert_eq!(host_cidr("10.0.0.1"), "10.0.0.1/32");
        assert_eq!(host_cidr("fd00::1"), "fd00::1/128");
        assert_eq!(host_cidr("192.168.0.0/16"), "192.168.0.0/16");
    }

    #[test]
    fn connections_url_swaps_scheme() {
        assert_eq!(
            connections_url("http://127.0.0.1:9090").expect("url"),
            "ws://127.0.0.1:9090/connections"
        );
        assert_eq!(
            connections_url("https://proxy.example.com:9090").expect("url"),
            "wss://proxy.example.com:9090/connections"
        );
    }
}
