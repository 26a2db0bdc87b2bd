use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use sui_db::models::{Client, ClientLink, LinkKind, Node};

/// Assembles a subscription's link list (section 4.11). On standalone/master
/// with no enabled remote nodes this is just the client's stored links;
/// otherwise every local-type link is rewritten once per reachable node and
/// prefixed with that node's name, while non-local links pass through
/// untouched.
pub fn build_links(client: &Client, nodes: &[Node]) -> Vec<ClientLink> {
    let stored: Vec<ClientLink> = serde_json::from_value(client.links.clone()).unwrap_or_default();

    let reachable: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.enable && n.external_host.as_deref().is_some_and(|h| !h.is_empty()))
        .collect();

    if reachable.is_empty() {
        return stored;
    }

    let mut out = Vec::new();
    for link in &stored {
        if link.kind != LinkKind::Local {
            out.push(link.clone());
            continue;
        }
        for node in &reachable {
            let host = node.external_host.as_deref().unwrap();
            let port = node.external_port;
            out.push(ClientLink {
                remark: format!("{}-{}", node.name, link.remark),
                kind: LinkKind::Remote,
                uri: rewrite_uri(&link.uri, host, port),
            });
        }
    }
    out
}

fn rewrite_uri(uri: &str, host: &str, port: Option<i32>) -> String {
    if let Some(rest) = uri.strip_prefix("vmess://") {
        return rewrite_vmess(rest, host, port)
            .map(|b64| format!("vmess://{b64}"))
            .unwrap_or_else(|| uri.to_string());
    }
    rewrite_host_query(uri, host, port)
}

fn rewrite_vmess(b64: &str, host: &str, port: Option<i32>) -> Option<String> {
    let decoded = B64.decode(b64).ok()?;
    let mut value: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let obj = value.as_object_mut()?;
    obj.insert("add".into(), serde_json::Value::String(host.to_string()));
    if let Some(p) = port {
        obj.insert("port".into(), serde_json::Value::String(p.to_string()));
    }
    if let Some(ps) = obj.get("ps").and_then(|v| v.as_str()).map(str::to_string) {
        obj.insert("ps".into(), serde_json::Value::String(format!("{host}-{ps}")));
    }
    let bytes = serde_json::to_vec(&value).ok()?;
    Some(B64.encode(bytes))
}

/// Best-effort rewrite for URI-form links (`scheme://cred@host:port?query#frag`):
/// replaces the authority's host (and port, if the node specifies one).
fn rewrite_host_query(uri: &str, host: &str, port: Option<i32>) -> String {
    let Some((scheme_and_cred, rest)) = uri.split_once('@') else {
        return uri.to_string();
    };
    let (authority, tail) = match rest.find(['?', '#']) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let new_authority = match (authority.split_once(':'), port) {
        (Some((_, _)), Some(p)) => format!("{host}:{p}"),
        (Some((_, old_port)), None) => format!("{host}:{old_port}"),
        (None, Some(p)) => format!("{host}:{p}"),
        (None, None) => host.to_string(),
    };
    format!("{scheme_and_cred}@{new_authority}{tail}")
}

/// Appends a human-readable remaining-quota/expiry tag as an extra comment
/// link, matching the "optional info tag" behavior in section 4.11.
pub fn info_tag(client: &Client, now: i64) -> Option<String> {
    let mut parts = Vec::new();
    if client.volume > 0 {
        let remaining = (client.volume - client.up - client.down).max(0);
        parts.push(format!("{} left", format_bytes(remaining)));
    }
    if client.expiry > 0 {
        let days = ((client.expiry - now).max(0)) / 86_400;
        parts.push(format!("{days}d left"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" · "))
    }
}

fn format_bytes(n: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

pub fn encode_subscription(links: &[ClientLink], base64_encode: bool) -> String {
    let joined = links.iter().map(|l| l.uri.as_str()).collect::<Vec<_>>().join("\n");
    if base64_encode {
        B64.encode(joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(links: serde_json::Value) -> Client {
        Client {
            id: 1,
            uuid: "u".into(),
            name: "n".into(),
            enable: true,
            volume: 1_000_000,
            expiry: 0,
            up: 100_000,
            down: 0,
            time_used: 0,
            time_limit: 0,
            speed_limit: 0,
            device_limit: 0,
            traffic_reset_strategy: "no_reset".into(),
            time_reset_strategy: "no_reset".into(),
            traffic_reset_at: 0,
            time_reset_at: 0,
            inbounds: serde_json::json!([]),
            config: serde_json::json!({}),
            links,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_reachable_nodes_returns_stored_links_unchanged() {
        let c = client(serde_json::json!([{"remark":"a","type":"local","uri":"trojan://x@old.example:443"}]));
        let links = build_links(&c, &[]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].uri, "trojan://x@old.example:443");
    }

    #[test]
    fn remote_links_pass_through_without_duplication() {
        let c = client(serde_json::json!([
            {"remark":"a","type":"remote","uri":"trojan://x@fixed.example:443"}
        ]));
        let node = Node {
            id: 1,
            node_id: "n1".into(),
            name: "tokyo".into(),
            address: None,
            external_host: Some("1.2.3.4".into()),
            external_port: Some(443),
            token: "t".into(),
            enable: true,
            status: "online".into(),
            last_seen: None,
            last_sync: None,
            version: None,
            created_at: Utc::now(),
        };
        let links = build_links(&c, &[node]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].uri, "trojan://x@fixed.example:443");
    }

    #[test]
    fn local_link_multiplexes_per_reachable_node() {
        let c = client(serde_json::json!([
            {"remark":"a","type":"local","uri":"trojan://x@old.example:443"}
        ]));
        let node = Node {
            id: 1,
            node_id: "n1".into(),
            name: "tokyo".into(),
            address: None,
            external_host: Some("1.2.3.4".into()),
            external_port: Some(8443),
            token: "t".into(),
            enable: true,
            status: "online".into(),
            last_seen: None,
            last_sync: None,
            version: None,
            created_at: Utc::now(),
        };
        let links = build_links(&c, &[node]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].remark, "tokyo-a");
        assert_eq!(links[0].uri, "trojan://x@1.2.3.4:8443");
    }

    #[test]
    fn info_tag_reports_remaining_volume() {
        let c = client(serde_json::json!([]));
        let tag = info_tag(&c, Utc::now().timestamp()).unwrap();
        assert!(tag.contains("left"));
    }
}
