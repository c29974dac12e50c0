use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Proxy type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub enum ProxyType {
    Direct,
    Reject,
    #[serde(rename = "RejectDrop")]
    RejectDrop,
    Pass,
    Compatible,
    Shadowsocks,
    ShadowsocksR,
    Snell,
    Socks5,
    Http,
    Vmess,
    Vless,
    Trojan,
    Hysteria,
    Hysteria2,
    WireGuard,
    Tuic,
    Ssh,
    Selector,
    Fallback,
    #[serde(rename = "URLTest")]
    URLTest,
    LoadBalance,
    Relay,
    Smart,
    #[serde(other)]
    Unknown,
}

impl ProxyType {
    /// Whether a group of this type accepts manual member switching.
    pub fn can_switch(&self) -> bool {
        matches!(
            self,
            ProxyType::Selector | ProxyType::URLTest | ProxyType::Fallback
        )
    }
}

/// Proxy node or group
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Proxy {
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
    pub name: String,
    pub now: Option<String>,
    pub all: Option<Vec<String>>,
    pub history: Option<Vec<DelayHistory>>,
    pub udp: Option<bool>,
}

impl Default for Proxy {
    fn default() -> Self {
        Self {
            proxy_type: ProxyType::Direct,
            name: String::new(),
            now: None,
            all: None,
            history: None,
            udp: None,
        }
    }
}

impl Proxy {
    /// Latency of the most recent delay test, if any.
    pub fn last_delay(&self) -> Option<u32> {
        self.history
            .as_ref()
            .and_then(|h| h.last())
            .map(|h| h.delay)
    }
}

/// Delay history
#[derive(Debug, Clone, Deserialize)]
pub struct DelayHistory {
    pub time: String,
    pub delay: u32,
    pub mean_delay: Option<u32>,
}

/// Proxies response from GET /proxies
#[derive(Debug, Clone, Deserialize)]
pub struct ProxiesResponse {
    pub proxies: HashMap<String, Proxy>,
}

/// Delay test response from GET /proxies/:name/delay
#[derive(Debug, Clone, Deserialize)]
pub struct DelayResponse {
    pub delay: u32,
}
