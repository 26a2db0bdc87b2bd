use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsResource {
    Inbound,
    Outbound,
    User,
}

impl StatsResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsResource::Inbound => "inbound",
            StatsResource::Outbound => "outbound",
            StatsResource::User => "user",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(StatsResource::Inbound),
            "outbound" => Some(StatsResource::Outbound),
            "user" => Some(StatsResource::User),
            _ => None,
        }
    }
}

/// Append-only traffic ledger row, aged out by `deleteOldStats`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatsRecord {
    pub id: i64,
    pub date_time: chrono::DateTime<chrono::Utc>,
    pub resource: String,
    pub tag: String,
    pub direction: String,
    pub traffic: i64,
    pub node_id: String,
}

/// Audit row appended on every state-altering decision.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Change {
    pub id: i64,
    pub date_time: chrono::DateTime<chrono::Utc>,
    pub actor: String,
    pub key: String,
    pub action: String,
    pub obj: serde_json::Value,
}
