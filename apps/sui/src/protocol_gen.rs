use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;

/// Every protocol family the external API (C10) can provision credentials for
/// on client creation (section 4.10). The proxy engine itself is out of
/// scope; this only needs to produce the opaque blob it will consume.
pub const SUPPORTED_PROTOCOLS: &[&str] = &[
    "mixed", "socks", "http", "ss", "ss16", "shadowtls", "vmess", "vless", "anytls", "trojan",
    "naive", "hysteria", "tuic", "hysteria2", "uap",
];

fn random_password(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Builds the `Client.config` blob: one key per supported protocol, each
/// populated with freshly-randomized credentials. Protocols that identify a
/// user by uuid (vmess/vless/trojan/anytls/uap) get `uuid` substituted in
/// rather than a random secret.
pub fn generate_client_config(uuid: &str) -> serde_json::Value {
    let mut obj = serde_json::Map::new();

    obj.insert("mixed".into(), json!({ "password": random_password(16) }));
    obj.insert("socks".into(), json!({ "password": random_password(16) }));
    obj.insert("http".into(), json!({ "password": random_password(16) }));
    obj.insert(
        "ss".into(),
        json!({ "method": "2022-blake3-aes-256-gcm", "password": random_password(32) }),
    );
    obj.insert(
        "ss16".into(),
        json!({ "method": "chacha20-ietf-poly1305", "password": random_password(32) }),
    );
    obj.insert("shadowtls".into(), json!({ "password": random_password(16) }));
    obj.insert("vmess".into(), json!({ "uuid": uuid, "alterId": 0 }));
    obj.insert("vless".into(), json!({ "uuid": uuid, "flow": "" }));
    obj.insert("anytls".into(), json!({ "uuid": uuid, "password": random_password(16) }));
    obj.insert("trojan".into(), json!({ "password": random_password(24) }));
    obj.insert("naive".into(), json!({ "username": uuid, "password": random_password(16) }));
    obj.insert("hysteria".into(), json!({ "auth_str": random_password(24) }));
    obj.insert(
        "tuic".into(),
        json!({ "uuid": uuid, "password": random_password(16) }),
    );
    obj.insert("hysteria2".into(), json!({ "password": random_password(24) }));
    obj.insert("uap".into(), json!({ "uuid": uuid, "password": random_password(16) }));

    serde_json::Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_supported_protocol() {
        let cfg = generate_client_config("11111111-1111-1111-1111-111111111111");
        let obj = cfg.as_object().unwrap();
        for proto in SUPPORTED_PROTOCOLS {
            assert!(obj.contains_key(*proto), "missing protocol {proto}");
        }
    }

    #[test]
    fn vmess_and_vless_carry_the_client_uuid() {
        let uuid = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";
        let cfg = generate_client_config(uuid);
        assert_eq!(cfg["vmess"]["uuid"], uuid);
        assert_eq!(cfg["vless"]["uuid"], uuid);
    }
}
