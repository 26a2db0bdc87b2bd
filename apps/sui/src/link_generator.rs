use sui_db::models::{CatalogEntry, Client, ClientLink, LinkKind};

/// The proxy-protocol link-string format is an external collaborator (section
/// 1's "link-string generation for specific proxy protocols"); C8 only needs
/// *a* generator, not its internals. `DefaultLinkGenerator` is a minimal
/// in-tree implementation so the control plane is runnable standalone.
pub trait LinkGenerator: Send + Sync {
    fn generate_local_links(&self, client: &Client, inbounds: &[CatalogEntry]) -> Vec<ClientLink>;
}

pub struct DefaultLinkGenerator;

impl LinkGenerator for DefaultLinkGenerator {
    fn generate_local_links(&self, client: &Client, inbounds: &[CatalogEntry]) -> Vec<ClientLink> {
        let by_id: std::collections::HashMap<i64, &CatalogEntry> =
            inbounds.iter().map(|i| (i.id, i)).collect();

        client
            .inbound_ids()
            .into_iter()
            .filter_map(|id| by_id.get(&id).copied())
            .filter_map(|inbound| {
                let protocol = inbound
                    .body
                    .get("protocol")
                    .and_then(|v| v.as_str())
                    .unwrap_or("vless");
                let cred = client.config.get(protocol)?;
                Some(ClientLink {
                    remark: inbound.tag.clone(),
                    kind: LinkKind::Local,
                    uri: render_uri(protocol, &client.uuid, cred, &inbound.tag),
                })
            })
            .collect()
    }
}

fn render_uri(protocol: &str, uuid: &str, cred: &serde_json::Value, tag: &str) -> String {
    match protocol {
        "vmess" => {
            let obj = serde_json::json!({
                "v": "2", "ps": tag, "add": "127.0.0.1", "port": "0",
                "id": uuid, "aid": cred.get("alterId").cloned().unwrap_or(serde_json::json!(0)),
                "net": "tcp", "type": "none", "tls": "",
            });
            use base64::Engine;
            format!(
                "vmess://{}",
                base64::engine::general_purpose::STANDARD.encode(obj.to_string())
            )
        }
        "trojan" => {
            let password = cred.get("password").and_then(|v| v.as_str()).unwrap_or("");
            format!("trojan://{password}@127.0.0.1:0#{tag}")
        }
        _ => {
            let secret = cred
                .get("password")
                .or_else(|| cred.get("uuid"))
                .and_then(|v| v.as_str())
                .unwrap_or(uuid);
            format!("{protocol}://{secret}@127.0.0.1:0#{tag}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn skips_inbounds_without_matching_protocol_credential() {
        let gen = DefaultLinkGenerator;
        let client = Client {
            id: 1,
            uuid: "u".into(),
            name: "n".into(),
            enable: true,
            volume: 0,
            expiry: 0,
            up: 0,
            down: 0,
            time_used: 0,
            time_limit: 0,
            speed_limit: 0,
            device_limit: 0,
            traffic_reset_strategy: "no_reset".into(),
            time_reset_strategy: "no_reset".into(),
            traffic_reset_at: 0,
            time_reset_at: 0,
            inbounds: serde_json::json!([1]),
            config: serde_json::json!({ "trojan": { "password": "hunter2" } }),
            links: serde_json::json!([]),
            created_at: Utc::now(),
        };
        let inbound = CatalogEntry {
            id: 1,
            tag: "in-trojan".into(),
            body: serde_json::json!({ "protocol": "trojan" }),
        };
        let links = gen.generate_local_links(&client, &[inbound]);
        assert_eq!(links.len(), 1);
        assert!(links[0].uri.starts_with("trojan://hunter2@"));
    }
}
