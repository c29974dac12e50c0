use serde::Serialize;

use super::{FieldKind, FormField};

/// A selectable outbound type with its UI label
#[derive(Debug, Clone, Serialize)]
pub struct OutboundTypeInfo {
    pub value: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// All outbound types the editor knows how to build forms for.
pub fn available_outbound_types() -> &'static [OutboundTypeInfo] {
    const TYPES: &[OutboundTypeInfo] = &[
        OutboundTypeInfo { value: "direct", label: "Direct", description: "Direct connection" },
        OutboundTypeInfo { value: "block", label: "Block", description: "Block connection" },
        OutboundTypeInfo { value: "dns", label: "DNS", description: "DNS outbound" },
        OutboundTypeInfo { value: "socks", label: "SOCKS", description: "SOCKS proxy" },
        OutboundTypeInfo { value: "http", label: "HTTP", description: "HTTP proxy" },
        OutboundTypeInfo { value: "shadowsocks", label: "Shadowsocks", description: "Shadowsocks protocol" },
        OutboundTypeInfo { value: "vmess", label: "VMess", description: "VMess protocol" },
        OutboundTypeInfo { value: "vless", label: "VLESS", description: "VLESS protocol" },
        OutboundTypeInfo { value: "trojan", label: "Trojan", description: "Trojan protocol" },
        OutboundTypeInfo { value: "wireguard", label: "WireGuard", description: "WireGuard VPN" },
        OutboundTypeInfo { value: "hysteria", label: "Hysteria", description: "Hysteria protocol" },
        OutboundTypeInfo { value: "hysteria2", label: "Hysteria2", description: "Hysteria2 protocol" },
        OutboundTypeInfo { value: "tuic", label: "TUIC", description: "TUIC protocol" },
        OutboundTypeInfo { value: "ssh", label: "SSH", description: "SSH tunnel" },
        OutboundTypeInfo { value: "tor", label: "Tor", description: "Tor network" },
        OutboundTypeInfo { value: "selector", label: "Selector", description: "Manual selection group" },
        OutboundTypeInfo { value: "urltest", label: "URLTest", description: "Auto selection group" },
    ];
    TYPES
}

/// Outbound types that require server/server_port fields.
pub fn requires_server(outbound_type: &str) -> bool {
    matches!(
        outbound_type,
        "socks"
            | "http"
            | "shadowsocks"
            | "vmess"
            | "vless"
            | "trojan"
            | "wireguard"
            | "hysteria"
            | "hysteria2"
            | "tuic"
            | "ssh"
    )
}

/// Build the form field list for an outbound type. `all_tags` feeds the
/// group member and detour selects.
pub fn outbound_form_fields(outbound_type: &str, all_tags: &[String]) -> Vec<FormField> {
    let mut fields = vec![
        FormField::new("type", FieldKind::Hidden)
            .preset(serde_json::Value::String(outbound_type.to_string()))
            .required(),
        FormField::new("tag", FieldKind::Text)
            .placeholder("my-outbound")
            .describe("Unique identifier for this outbound")
            .required(),
    ];

    let tags: Vec<String> = all_tags.to_vec();

    match outbound_type {
        "direct" => {
            fields.push(FormField::new("override_address", FieldKind::Text).placeholder("1.1.1.1"));
            fields.push(FormField::new("override_port", FieldKind::Number).placeholder("53"));
        }
        "block" | "dns" => {
            // No additional fields
        }
        "socks" => {
            fields.push(server_field("127.0.0.1"));
            fields.push(port_field("1080"));
            fields.push(
                FormField::new("version", FieldKind::Select)
                    .options(&["5", "4", "4a"])
                    .describe("SOCKS protocol version"),
            );
            fields.push(FormField::new("username", FieldKind::Text));
            fields.push(FormField::new("password", FieldKind::Password));
            fields.push(
                FormField::new("network", FieldKind::Select).options(&["tcp", "udp", "tcp,udp"]),
            );
        }
        "http" => {
            fields.push(server_field("127.0.0.1"));
            fields.push(port_field("8080"));
            fields.push(FormField::new("username", FieldKind::Text));
            fields.push(FormField::new("password", FieldKind::Password));
            fields.push(FormField::new("path", FieldKind::Text).placeholder("/"));
        }
        "shadowsocks" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("8388"));
            fields.push(
                FormField::new("method", FieldKind::Select)
                    .options(&[
                        "2022-blake3-aes-128-gcm",
                        "2022-blake3-aes-256-gcm",
                        "2022-blake3-chacha20-poly1305",
                        "aes-128-gcm",
                        "aes-256-gcm",
                        "chacha20-ietf-poly1305",
                    ])
                    .describe("Encryption method")
                    .required(),
            );
            fields.push(FormField::new("password", FieldKind::Password).required());
            fields.push(
                FormField::new("network", FieldKind::Select).options(&["tcp", "udp", "tcp,udp"]),
            );
        }
        "vmess" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("443"));
            fields.push(
                FormField::new("uuid", FieldKind::Text)
                    .label("UUID")
                    .placeholder("uuid-here")
                    .required(),
            );
            fields.push(FormField::new("security", FieldKind::Select).options(&[
                "auto",
                "none",
                "aes-128-gcm",
                "chacha20-poly1305",
            ]));
            fields.push(FormField::new("alter_id", FieldKind::Number).placeholder("0"));
        }
        "vless" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("443"));
            fields.push(
                FormField::new("uuid", FieldKind::Text)
                    .label("UUID")
                    .placeholder("uuid-here")
                    .required(),
            );
            fields.push(FormField::new("flow", FieldKind::Select).options(&["", "xtls-rprx-vision"]));
        }
        "trojan" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("443"));
            fields.push(FormField::new("password", FieldKind::Password).required());
        }
        "wireguard" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("51820"));
            fields.push(
                FormField::new("local_address", FieldKind::Array)
                    .placeholder("10.0.0.2/32")
                    .describe("Local IP address(es)")
                    .required(),
            );
            fields.push(FormField::new("private_key", FieldKind::Text).required());
            fields.push(FormField::new("peer_public_key", FieldKind::Text).required());
            fields.push(FormField::new("pre_shared_key", FieldKind::Text));
            fields.push(FormField::new("mtu", FieldKind::Number).label("MTU").placeholder("1408"));
        }
        "hysteria" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("443"));
            fields.push(
                FormField::new("up_mbps", FieldKind::Number)
                    .label("Upload (Mbps)")
                    .placeholder("10"),
            );
            fields.push(
                FormField::new("down_mbps", FieldKind::Number)
                    .label("Download (Mbps)")
                    .placeholder("50"),
            );
            fields.push(FormField::new("auth_str", FieldKind::Password).label("Auth String"));
            fields.push(FormField::new("obfs", FieldKind::Text).label("Obfuscation"));
        }
        "hysteria2" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("443"));
            fields.push(
                FormField::new("up_mbps", FieldKind::Number)
                    .label("Upload (Mbps)")
                    .placeholder("10"),
            );
            fields.push(
                FormField::new("down_mbps", FieldKind::Number)
                    .label("Download (Mbps)")
                    .placeholder("50"),
            );
            fields.push(FormField::new("password", FieldKind::Password));
        }
        "tuic" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("443"));
            fields.push(
                FormField::new("uuid", FieldKind::Text)
                    .label("UUID")
                    .placeholder("uuid-here")
                    .required(),
            );
            fields.push(FormField::new("password", FieldKind::Password));
            fields.push(
                FormField::new("congestion_control", FieldKind::Select).options(&[
                    "cubic",
                    "new_reno",
                    "bbr",
                ]),
            );
        }
        "ssh" => {
            fields.push(server_field("example.com"));
            fields.push(port_field("22"));
            fields.push(FormField::new("user", FieldKind::Text).required());
            fields.push(FormField::new("password", FieldKind::Password));
            fields.push(
                FormField::new("private_key", FieldKind::Textarea)
                    .describe("SSH private key content"),
            );
        }
        "tor" => {
            fields.push(
                FormField::new("executable_path", FieldKind::Text)
                    .label("Tor Executable Path")
                    .placeholder("/usr/bin/tor"),
            );
            fields.push(FormField::new("data_directory", FieldKind::Text));
        }
        "selector" => {
            fields.push(
                FormField::new("outbounds", FieldKind::Multiselect)
                    .owned_options(tags.clone())
                    .describe("Select outbounds for this group")
                    .required(),
            );
            fields.push(
                FormField::new("default", FieldKind::Select)
                    .owned_options(tags.clone())
                    .describe("Default outbound to use"),
            );
            fields.push(FormField::new("interrupt_exist_connections", FieldKind::Checkbox));
        }
        "urltest" => {
            fields.push(
                FormField::new("outbounds", FieldKind::Multiselect)
                    .owned_options(tags.clone())
                    .describe("Select outbounds to test")
                    .required(),
            );
            fields.push(
                FormField::new("url", FieldKind::Text)
                    .label("Test URL")
                    .placeholder("https://www.gstatic.com/generate_204"),
            );
            fields.push(
                FormField::new("interval", FieldKind::Number)
                    .label("Test Interval (seconds)")
                    .placeholder("180"),
            );
            fields.push(
                FormField::new("tolerance", FieldKind::Number)
                    .label("Tolerance (ms)")
                    .placeholder("50"),
            );
            fields.push(FormField::new("interrupt_exist_connections", FieldKind::Checkbox));
        }
        _ => {}
    }

    // Dialer options apply to everything that actually dials out
    if !matches!(outbound_type, "block" | "dns" | "selector" | "urltest") {
        fields.push(
            FormField::new("detour", FieldKind::Select)
                .owned_options(tags)
                .describe("Use another outbound as proxy chain"),
        );
        fields.push(
            FormField::new("bind_interface", FieldKind::Text)
                .describe("Bind to specific network interface"),
        );
        fields.push(
            FormField::new("connect_timeout", FieldKind::Number)
                .label("Connect Timeout (seconds)")
                .placeholder("5"),
        );
        fields.push(FormField::new("tcp_fast_open", FieldKind::Checkbox).label("TCP Fast Open"));
    }

    fields
}

fn server_field(placeholder: &str) -> FormField {
    FormField::new("server", FieldKind::Text)
        .placeholder(placeholder)
        .describe("")
        .required()
}

fn port_field(placeholder: &str) -> FormField {
    FormField::new("server_port", FieldKind::Number)
        .placeholder(placeholder)
        .required()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_builds_with_common_fields() {
        let tags = vec!["direct".to_string(), "proxy".to_string()];
        for info in available_outbound_types() {
            let fields = outbound_form_fields(info.value, &tags);
            assert_eq!(fields[0].name, "type", "type field first for {}", info.value);
            assert_eq!(fields[1].name, "tag", "tag field second for {}", info.value);
        }
    }

    #[test]
    fn proxy_protocols_require_server() {
        let fields = outbound_form_fields("shadowsocks", &[]);
        let server = fields.iter().find(|f| f.name == "server").expect("server");
        assert!(server.required);
        assert!(requires_server("shadowsocks"));
        assert!(!requires_server("selector"));
    }

    #[test]
    fn groups_get_member_multiselect_and_no_dialer_fields() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let fields = outbound_form_fields("selector", &tags);
        let members = fields.iter().find(|f| f.name == "outbounds").expect("f");
        assert_eq!(members.kind, FieldKind::Multiselect);
        assert_eq!(members.options, vec!["a", "b"]);
        assert!(fields.iter().all(|f| f.name != "detour"));
    }

    #[test]
    fn dialer_fields_present_for_proxy_types() {
        let fields = outbound_form_fields("socks", &[]);
        assert!(fields.iter().any(|f| f.name == "detour"));
        assert!(fields.iter().any(|f| f.name == "tcp_fast_open"));
    }
}
