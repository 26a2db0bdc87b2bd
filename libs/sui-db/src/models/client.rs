use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sui_shared::ResetStrategy;

/// A proxy account: identity, quota, and the policy the quota engine enforces
/// against it. `uuid` is the externally-stable key used by the subscription
/// link and the external API; `name` is the unique display label.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub enable: bool,
    pub volume: i64,
    pub expiry: i64,
    pub up: i64,
    pub down: i64,
    pub time_used: i64,
    pub time_limit: i64,
    pub speed_limit: i64,
    pub device_limit: i32,
    pub traffic_reset_strategy: String,
    pub time_reset_strategy: String,
    pub traffic_reset_at: i64,
    pub time_reset_at: i64,
    /// JSON array of inbound ids this client is associated with.
    pub inbounds: serde_json::Value,
    /// Opaque per-protocol credential blob (mixed/vmess/trojan/...).
    pub config: serde_json::Value,
    /// Pre-rendered share links, regenerated by C8 on every mutation that
    /// touches uuid/name/enable/config.
    pub links: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Client {
    pub fn traffic_reset_strategy(&self) -> ResetStrategy {
        ResetStrategy::from_str_loose(&self.traffic_reset_strategy)
    }

    pub fn time_reset_strategy(&self) -> ResetStrategy {
        ResetStrategy::from_str_loose(&self.time_reset_strategy)
    }

    pub fn inbound_ids(&self) -> Vec<i64> {
        self.inbounds
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default()
    }

    /// Union predicate evaluated by `depleteExhausted` (section 4.4).
    pub fn is_exhausted(&self, now: i64) -> Option<&'static str> {
        if self.volume > 0 && self.up + self.down > self.volume {
            return Some("traffic_exceeded");
        }
        if self.expiry > 0 && self.expiry < now {
            return Some("user_expired");
        }
        if self.time_limit > 0 && self.time_used >= self.time_limit {
            return Some("time_exceeded");
        }
        None
    }
}

/// A link entry inside `Client.links`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLink {
    pub remark: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Local,
    Remote,
}
