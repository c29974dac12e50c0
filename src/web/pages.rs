use axum::response::Html;

/// Minimal server-rendered shells. Each page loads its data from the
/// JSON API endpoints listed in the body.
fn shell(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} - sbadmin</title>\n\
         <style>body{{font-family:sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}}\
         nav a{{margin-right:1rem}}</style>\n</head>\n<body>\n\
         <nav>\n\
         <a href=\"/\">Overview</a>\n\
         <a href=\"/rules\">Rules</a>\n\
         <a href=\"/rule-actions\">Rule Actions</a>\n\
         <a href=\"/outbounds\">Outbounds</a>\n\
         <a href=\"/proxies\">Proxies</a>\n\
         <a href=\"/connections\">Connections</a>\n\
         <a href=\"/service\">Service</a>\n\
         <a href=\"/backups\">Backups</a>\n\
         </nav>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    ))
}

pub async fn index() -> Html<String> {
    shell(
        "Overview",
        "<p>Web admin for a sing-box instance: edit routing rules and \
         outbounds, control the systemd service, watch live connections \
         and manage configuration backups.</p>\
         <p>Configuration document: <code>GET /api/config</code></p>",
    )
}

pub async fn rules() -> Html<String> {
    shell(
        "Routing Rules",
        "<p>Data: <code>GET /api/rules</code>, forms: \
         <code>GET /api/rules/form?kind=default-rule</code></p>",
    )
}

pub async fn rule_actions() -> Html<String> {
    shell(
        "Rule Actions",
        "<p>Data: <code>GET /api/rule-actions</code>, form: \
         <code>GET /api/rule-actions/form</code></p>",
    )
}

pub async fn outbounds() -> Html<String> {
    shell(
        "Outbounds",
        "<p>Data: <code>GET /api/outbounds</code>, forms: \
         <code>GET /api/outbounds/form?type=shadowsocks</code></p>",
    )
}

pub async fn proxies() -> Html<String> {
    shell(
        "Proxies",
        "<p>Groups and latencies: <code>GET /api/proxies/groups</code></p>",
    )
}

pub async fn connections() -> Html<String> {
    shell(
        "Connections",
        "<p>Live stream: <code>ws://this-host/ws/connections</code></p>",
    )
}

pub async fn service() -> Html<String> {
    shell(
        "Service",
        "<p>Status: <code>GET /api/service/status</code>, logs: \
         <code>GET /api/service/logs?lines=50</code></p>",
    )
}

pub async fn backups() -> Html<String> {
    shell(
        "Backups",
        "<p>List: <code>GET /api/config/backups</code>, export: \
         <code>GET /api/config/export</code></p>",
    )
}
