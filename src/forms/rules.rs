use serde_json::{Map, Value};

use super::{FieldKind, FormDefinition, FormError, FormField};

const LOGIC_MODES: [&str; 2] = ["and", "or"];
const CLASH_MODES: [&str; 3] = ["direct", "global", "rule"];
const DNS_STRATEGIES: [&str; 4] = ["prefer_ipv4", "prefer_ipv6", "ipv4_only", "ipv6_only"];
const ACTIONS: [&str; 6] = [
    "route",
    "sniff",
    "resolve",
    "reject",
    "route-options",
    "hijack-dns",
];
const REJECT_METHODS: [&str; 2] = ["default", "drop"];
const RULE_SET_FORMATS: [&str; 2] = ["source", "binary"];

/// Recognized rule action types
pub fn available_actions() -> &'static [&'static str] {
    &ACTIONS
}

/// Rule form kinds that can be built
pub fn available_rule_kinds() -> &'static [&'static str] {
    &[
        "default-rule",
        "logical-rule",
        "default-dns-rule",
        "logical-dns-rule",
        "local-rule-set",
        "remote-rule-set",
    ]
}

/// Build the field list for a rule form kind.
pub fn build_rule_form(kind: &str) -> Result<FormDefinition, FormError> {
    let (title, fields) = match kind {
        "default-rule" => ("Route Rule", default_rule_fields()),
        "logical-rule" => ("Logical Rule", logical_rule_fields()),
        "default-dns-rule" => ("DNS Rule", default_dns_rule_fields()),
        "logical-dns-rule" => ("Logical DNS Rule", logical_dns_rule_fields()),
        "local-rule-set" => ("Local Rule Set", local_rule_set_fields()),
        "remote-rule-set" => ("Remote Rule Set", remote_rule_set_fields()),
        other => return Err(FormError::UnsupportedType(other.to_string())),
    };

    Ok(FormDefinition {
        name: kind.to_string(),
        title: title.to_string(),
        fields,
    })
}

/// Guess the rule kind from an existing rule's shape, for edit forms
/// opened without an explicit kind.
pub fn detect_rule_kind(rule: &Map<String, Value>) -> &'static str {
    if rule.contains_key("mode") && rule.contains_key("rules") {
        if rule.contains_key("server") {
            return "logical-dns-rule";
        }
        return "logical-rule";
    }

    match rule.get("type").and_then(Value::as_str) {
        Some("local") => return "local-rule-set",
        Some("remote") => return "remote-rule-set",
        _ => {}
    }

    if rule.contains_key("server") {
        return "default-dns-rule";
    }

    "default-rule"
}

fn match_fields() -> Vec<FormField> {
    vec![
        FormField::new("inbound", FieldKind::Array),
        FormField::new("network", FieldKind::Array).placeholder("tcp, udp"),
        FormField::new("protocol", FieldKind::Array).placeholder("tls, http, quic"),
        FormField::new("domain", FieldKind::Array).placeholder("example.com"),
        FormField::new("domain_suffix", FieldKind::Array).placeholder(".example.com"),
        FormField::new("domain_keyword", FieldKind::Array),
        FormField::new("domain_regex", FieldKind::Array),
        FormField::new("geosite", FieldKind::Array).placeholder("cn, google"),
        FormField::new("geoip", FieldKind::Array).placeholder("CN, US"),
        FormField::new("source_geoip", FieldKind::Array),
        FormField::new("ip_cidr", FieldKind::Array).placeholder("192.168.0.0/16"),
        FormField::new("source_ip_cidr", FieldKind::Array),
        FormField::new("ip_is_private", FieldKind::Checkbox),
        FormField::new("source_ip_is_private", FieldKind::Checkbox),
        FormField::new("port", FieldKind::Array).placeholder("e.g., 80, 443, 8080"),
        FormField::new("source_port", FieldKind::Array).placeholder("e.g., 80, 443, 8080"),
        FormField::new("port_range", FieldKind::Array).placeholder("1000:2000"),
        FormField::new("source_port_range", FieldKind::Array),
        FormField::new("process_name", FieldKind::Array),
        FormField::new("process_path", FieldKind::Array),
        FormField::new("user", FieldKind::Array),
        FormField::new("rule_set", FieldKind::Array),
        FormField::new("clash_mode", FieldKind::Select).options(&CLASH_MODES),
        FormField::new("invert", FieldKind::Checkbox),
    ]
}

fn default_rule_fields() -> Vec<FormField> {
    let mut fields = match_fields();
    fields.push(FormField::new("action", FieldKind::Select).options(&ACTIONS));
    fields.push(FormField::new("outbound", FieldKind::Text));
    fields
}

fn logical_rule_fields() -> Vec<FormField> {
    vec![
        FormField::new("mode", FieldKind::Select)
            .options(&LOGIC_MODES)
            .required(),
        FormField::new("rules", FieldKind::Textarea)
            .describe("Sub-rules as a JSON array")
            .required(),
        FormField::new("invert", FieldKind::Checkbox),
        FormField::new("action", FieldKind::Select).options(&ACTIONS),
        FormField::new("outbound", FieldKind::Text),
    ]
}

fn default_dns_rule_fields() -> Vec<FormField> {
    let mut fields = match_fields();
    fields.push(FormField::new("server", FieldKind::Text).required());
    fields.push(FormField::new("strategy", FieldKind::Select).options(&DNS_STRATEGIES));
    fields.push(FormField::new("disable_cache", FieldKind::Checkbox));
    fields.push(FormField::new("rewrite_ttl", FieldKind::Number));
    fields.push(FormField::new("client_subnet", FieldKind::Text));
    fields
}

fn logical_dns_rule_fields() -> Vec<FormField> {
    vec![
        FormField::new("mode", FieldKind::Select)
            .options(&LOGIC_MODES)
            .required(),
        FormField::new("rules", FieldKind::Textarea)
            .describe("Sub-rules as a JSON array")
            .required(),
        FormField::new("invert", FieldKind::Checkbox),
        FormField::new("server", FieldKind::Text).required(),
        FormField::new("strategy", FieldKind::Select).options(&DNS_STRATEGIES),
        FormField::new("disable_cache", FieldKind::Checkbox),
    ]
}

fn local_rule_set_fields() -> Vec<FormField> {
    vec![
        FormField::new("type", FieldKind::Hidden)
            .preset(Value::String("local".to_string()))
            .required(),
        FormField::new("tag", FieldKind::Text).required(),
        FormField::new("format", FieldKind::Select)
            .options(&RULE_SET_FORMATS)
            .required(),
        FormField::new("path", FieldKind::Text)
            .placeholder("/etc/sing-box/rules.srs")
            .required(),
    ]
}

fn remote_rule_set_fields() -> Vec<FormField> {
    vec![
        FormField::new("type", FieldKind::Hidden)
            .preset(Value::String("remote".to_string()))
            .required(),
        FormField::new("tag", FieldKind::Text).required(),
        FormField::new("format", FieldKind::Select)
            .options(&RULE_SET_FORMATS)
            .required(),
        FormField::new("url", FieldKind::Text)
            .placeholder("https://example.com/rules.srs")
            .required(),
        FormField::new("download_detour", FieldKind::Text),
        FormField::new("update_interval", FieldKind::Text).placeholder("1d"),
    ]
}

/// Build the rule action form. Action-specific fields are all present;
/// the UI shows the subset matching the selected action type.
pub fn rule_action_form(outbound_tags: Vec<String>) -> FormDefinition {
    let fields = vec![
        FormField::new("action", FieldKind::Select)
            .options(&ACTIONS)
            .required(),
        FormField::new("outbound", FieldKind::Select).owned_options(outbound_tags),
        FormField::new("sniffer", FieldKind::Array).placeholder("tls, http, quic, dns"),
        FormField::new("timeout", FieldKind::Number)
            .describe("Timeout for protocol sniffing in milliseconds"),
        FormField::new("server", FieldKind::Text),
        FormField::new("strategy", FieldKind::Select).options(&DNS_STRATEGIES),
        FormField::new("disable_cache", FieldKind::Checkbox),
        FormField::new("rewrite_ttl", FieldKind::Number),
        FormField::new("client_subnet", FieldKind::Text),
        FormField::new("method", FieldKind::Select).options(&REJECT_METHODS),
        FormField::new("no_drop", FieldKind::Checkbox),
        FormField::new("override_address", FieldKind::Text),
        FormField::new("override_port", FieldKind::Number),
        FormField::new("network_strategy", FieldKind::Text),
        FormField::new("fallback_delay", FieldKind::Number),
        FormField::new("udp_disable_domain_unmapping", FieldKind::Checkbox),
        FormField::new("udp_connect", FieldKind::Checkbox),
        FormField::new("udp_timeout", FieldKind::Number),
        FormField::new("tls_fragment", FieldKind::Checkbox),
        FormField::new("tls_fragment_fallback_delay", FieldKind::Number),
        FormField::new("tls_record_fragment", FieldKind::Checkbox),
    ];

    FormDefinition {
        name: "rule-action".to_string(),
        title: "Rule Action".to_string(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: Value) -> Map<String, Value> {
        v.as_object().expect("object").clone()
    }

    #[test]
    fn detects_logical_and_dns_kinds() {
        assert_eq!(
            detect_rule_kind(&as_map(json!({"mode": "and", "rules": []}))),
            "logical-rule"
        );
        assert_eq!(
            detect_rule_kind(&as_map(
                json!({"mode": "or", "rules": [], "server": "dns-local"})
            )),
            "logical-dns-rule"
        );
        assert_eq!(
            detect_rule_kind(&as_map(json!({"server": "dns-local"}))),
            "default-dns-rule"
        );
    }

    #[test]
    fn detects_rule_set_kinds() {
        assert_eq!(
            detect_rule_kind(&as_map(json!({"type": "local", "path": "x"}))),
            "local-rule-set"
        );
        assert_eq!(
            detect_rule_kind(&as_map(json!({"type": "remote", "url": "x"}))),
            "remote-rule-set"
        );
    }

    #[test]
    fn falls_back_to_default_rule() {
        assert_eq!(
            detect_rule_kind(&as_map(json!({"domain": ["a"], "outbound": "direct"}))),
            "default-rule"
        );
    }

    #[test]
    fn every_advertised_kind_builds() {
        for kind in available_rule_kinds() {
            assert!(build_rule_form(kind).is_ok(), "kind {kind} failed");
        }
    }

    #[test]
    fn action_form_lists_outbounds() {
        let form = rule_action_form(vec!["direct".into(), "proxy".into()]);
        let outbound = form.fields.iter().find(|f| f.name == "outbound").expect("f");
        assert_eq!(outbound.options, vec!["direct", "proxy"]);
    }
}
