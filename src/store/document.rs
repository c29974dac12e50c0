use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The sing-box configuration document.
///
/// Only the sections this tool edits are modeled; everything else
/// round-trips untouched through the flattened `extra` map. Rules,
/// outbounds and rule actions stay as raw JSON maps because their shapes
/// are polymorphic and versioned by the upstream project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbounds: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbounds: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `route` section of the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Value>>,

    #[serde(rename = "rule_action", skip_serializing_if = "Option::is_none")]
    pub rule_actions: Option<Vec<Value>>,

    #[serde(rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_outbound: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    /// The document synthesized when no config file exists yet: an empty
    /// rule list routed to "direct".
    pub fn default_document() -> Self {
        Config {
            route: Some(Route {
                rules: Some(Vec::new()),
                final_outbound: Some("direct".to_string()),
                ..Route::default()
            }),
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_sections_round_trip() {
        let raw = json!({
            "log": {"level": "info"},
            "experimental": {"cache_file": {"enabled": true}},
            "route": {
                "rules": [{"domain": ["example.com"], "outbound": "direct"}],
                "final": "proxy",
                "auto_detect_interface": true
            }
        });

        let config: Config = serde_json::from_value(raw.clone()).expect("parse");
        assert!(config.extra.contains_key("experimental"));
        let route = config.route.as_ref().expect("route");
        assert_eq!(route.final_outbound.as_deref(), Some("proxy"));
        assert_eq!(
            route.extra.get("auto_detect_interface"),
            Some(&Value::Bool(true))
        );

        let back = serde_json::to_value(&config).expect("serialize");
        assert_eq!(back, raw);
    }

    #[test]
    fn default_document_shape() {
        let config = Config::default_document();
        let route = config.route.expect("route");
        assert_eq!(route.rules.as_deref(), Some(&[][..]));
        assert_eq!(route.final_outbound.as_deref(), Some("direct"));
        assert!(config.outbounds.is_none());
    }
}
