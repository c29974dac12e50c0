mod outbounds;
mod rules;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use outbounds::{
    available_outbound_types, outbound_form_fields, requires_server, OutboundTypeInfo,
};
pub use rules::{
    available_actions, available_rule_kinds, build_rule_form, detect_rule_kind, rule_action_form,
};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("unsupported form kind: {0}")]
    UnsupportedType(String),
}

/// Widget kind a field renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Checkbox,
    Select,
    Array,
    Password,
    Multiselect,
    Hidden,
}

/// A single form field descriptor
#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    /// JSON key in the config document
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Current value for non-array fields in edit mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Current values for array fields in edit mode
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl FormField {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: title_case(name),
            kind,
            placeholder: None,
            required: false,
            options: Vec::new(),
            description: describe_field(name).to_string(),
            value: None,
            values: Vec::new(),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn owned_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn preset(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, FieldKind::Array | FieldKind::Multiselect)
    }
}

/// A complete form
#[derive(Debug, Clone, Serialize)]
pub struct FormDefinition {
    pub name: String,
    pub title: String,
    pub fields: Vec<FormField>,
}

impl FormDefinition {
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

/// Fill a built form's values from an existing config entry for edit
/// flows. Shapes that don't match the descriptor degrade instead of
/// failing: a scalar in an array slot becomes a one-element list, and
/// non-boolean values are ignored for checkboxes.
pub fn populate(form: &mut FormDefinition, data: &Map<String, Value>) {
    for field in &mut form.fields {
        let Some(value) = data.get(&field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        if field.is_array() {
            field.values = match value {
                Value::Array(items) => items.iter().map(value_to_string).collect(),
                other => vec![value_to_string(other)],
            };
        } else if field.kind == FieldKind::Checkbox {
            if let Value::Bool(b) = value {
                field.value = Some(Value::Bool(*b));
            }
        } else {
            field.value = Some(value.clone());
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Derive a human label from a JSON key: "domain_suffix" -> "Domain Suffix"
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Help text for recognized config keys
pub fn describe_field(key: &str) -> &'static str {
    match key {
        // Action fields
        "action" => "Action type: 'route' (route to outbound), 'sniff' (protocol sniffing), 'resolve' (DNS resolution), 'reject' (block traffic), 'route-options' (advanced routing), 'hijack-dns' (DNS hijacking)",
        "outbound" => "Target outbound for 'route' action",

        // Sniff action fields
        "sniffer" => "Enabled sniffers for 'sniff' action (empty = all enabled)",
        "sniff_timeout" => "Timeout for protocol sniffing in milliseconds",

        // Resolve action fields
        "server" => "DNS server for 'resolve' action or DNS routing",
        "strategy" => "DNS resolution strategy: prefer_ipv4, prefer_ipv6, ipv4_only, ipv6_only",
        "disable_cache" => "Disable DNS cache for this rule",
        "rewrite_ttl" => "Override DNS response TTL (in seconds)",
        "client_subnet" => "Client subnet for EDNS Client Subnet (ECS)",

        // Reject action fields
        "method" => "Reject method: 'default' or 'drop'",
        "no_drop" => "Don't drop the connection for reject action",

        // Route-options action fields
        "override_address" => "Override destination address",
        "override_port" => "Override destination port",
        "network_strategy" => "Network strategy for route-options",
        "fallback_delay" => "Fallback delay in milliseconds",
        "udp_disable_domain_unmapping" => "Disable domain unmapping for UDP",
        "udp_connect" => "Use connected UDP socket",
        "udp_timeout" => "UDP timeout in seconds",
        "tls_fragment" => "Enable TLS fragmentation",
        "tls_fragment_fallback_delay" => "TLS fragment fallback delay",
        "tls_record_fragment" => "Enable TLS record fragmentation",

        // Rule matching fields
        "domain" => "Exact domain names to match (e.g., google.com)",
        "domain_suffix" => "Domain suffixes to match (e.g., .google.com matches google.com and all subdomains)",
        "domain_keyword" => "Keywords that must appear in the domain",
        "domain_regex" => "Regular expressions for domain matching",
        "geosite" => "Geosite categories (e.g., cn, google, facebook)",
        "geoip" => "Country codes for destination IP (e.g., CN, US)",
        "source_geoip" => "Country codes for source IP",
        "ip_cidr" => "IP CIDR ranges for destination (e.g., 192.168.0.0/16)",
        "source_ip_cidr" => "IP CIDR ranges for source",
        "port" => "Destination ports to match (e.g., 80, 443)",
        "source_port" => "Source ports to match",
        "port_range" => "Destination port ranges (e.g., 1000:2000)",
        "source_port_range" => "Source port ranges",
        "protocol" => "Network protocols (e.g., tcp, udp)",
        "network" => "Network types (e.g., tcp, udp)",
        "inbound" => "Inbound tags to match",
        "process_name" => "Process names to match",
        "process_path" => "Process paths to match",
        "user" => "User names to match",
        "rule_set" => "Rule set references",
        "mode" => "Logical mode: 'and' (all rules must match) or 'or' (any rule must match)",
        "invert" => "Invert the rule match result",
        "ip_is_private" => "Match private IP addresses",
        "source_ip_is_private" => "Match private source IP addresses",
        "clash_mode" => "Clash mode to match: direct, global or rule",

        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn title_case_from_json_key() {
        assert_eq!(title_case("domain_suffix"), "Domain Suffix");
        assert_eq!(title_case("server"), "Server");
    }

    #[test]
    fn string_array_field_has_array_kind_and_json_key() {
        let form = build_rule_form("default-rule").expect("form");
        let field = form
            .fields
            .iter()
            .find(|f| f.name == "domain")
            .expect("domain field");
        assert_eq!(field.kind, FieldKind::Array);
        assert_eq!(field.name, "domain");
    }

    #[test]
    fn bool_field_has_checkbox_kind() {
        let form = build_rule_form("default-rule").expect("form");
        let field = form
            .fields
            .iter()
            .find(|f| f.name == "invert")
            .expect("invert field");
        assert_eq!(field.kind, FieldKind::Checkbox);
    }

    #[test]
    fn recognized_fields_get_descriptions() {
        let form = build_rule_form("default-rule").expect("form");
        let field = form
            .fields
            .iter()
            .find(|f| f.name == "domain_suffix")
            .expect("field");
        assert!(!field.description.is_empty());
    }

    #[test]
    fn logic_mode_is_an_enumerated_select() {
        let form = build_rule_form("logical-rule").expect("form");
        let field = form.fields.iter().find(|f| f.name == "mode").expect("mode");
        assert_eq!(field.kind, FieldKind::Select);
        assert_eq!(field.options, vec!["and", "or"]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            build_rule_form("no-such-kind"),
            Err(FormError::UnsupportedType(_))
        ));
    }

    #[test]
    fn populate_fills_arrays_and_scalars() {
        let mut form = build_rule_form("default-rule").expect("form");
        let data = json!({
            "domain": ["example.com", "example.org"],
            "invert": true,
            "outbound": "proxy"
        });
        populate(&mut form, data.as_object().expect("object"));

        let domain = form.fields.iter().find(|f| f.name == "domain").expect("f");
        assert_eq!(domain.values, vec!["example.com", "example.org"]);

        let invert = form.fields.iter().find(|f| f.name == "invert").expect("f");
        assert_eq!(invert.value, Some(Value::Bool(true)));

        let outbound = form.fields.iter().find(|f| f.name == "outbound").expect("f");
        assert_eq!(outbound.value, Some(json!("proxy")));
    }

    #[test]
    fn populate_coerces_scalar_into_array_slot() {
        let mut form = build_rule_form("default-rule").expect("form");
        let data = json!({"domain": "example.com", "port": [443, 8443]});
        populate(&mut form, data.as_object().expect("object"));

        let domain = form.fields.iter().find(|f| f.name == "domain").expect("f");
        assert_eq!(domain.values, vec!["example.com"]);

        let port = form.fields.iter().find(|f| f.name == "port").expect("f");
        assert_eq!(port.values, vec!["443", "8443"]);
    }

    #[test]
    fn populate_ignores_non_bool_for_checkbox() {
        let mut form = build_rule_form("default-rule").expect("form");
        let data = json!({"invert": "yes"});
        populate(&mut form, data.as_object().expect("object"));
        let invert = form.fields.iter().find(|f| f.name == "invert").expect("f");
        assert!(invert.value.is_none());
    }
}
