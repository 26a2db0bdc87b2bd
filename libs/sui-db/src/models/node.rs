use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A running control-plane process in worker mode, as seen by the master.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Node {
    pub id: i64,
    pub node_id: String,
    pub name: String,
    pub address: Option<String>,
    pub external_host: Option<String>,
    pub external_port: Option<i32>,
    pub token: String,
    pub enable: bool,
    pub status: String,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub last_sync: Option<chrono::DateTime<chrono::Utc>>,
    pub version: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Online,
    Offline,
    Error,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
            NodeStatus::Error => "error",
        }
    }
}

impl Node {
    /// Sweep transition rule from section 4.6: online -> offline at 60s stale,
    /// offline -> error at 300s stale. Never downgrades a node the operator
    /// disabled administratively.
    pub fn sweep_status(&self, now: chrono::DateTime<chrono::Utc>) -> Option<NodeStatus> {
        let last_seen = self.last_seen?;
        let stale_for = (now - last_seen).num_seconds();

        match self.status.as_str() {
            "online" if stale_for >= 60 => Some(NodeStatus::Offline),
            "offline" if stale_for >= 300 => Some(NodeStatus::Error),
            _ => None,
        }
    }
}

/// Single-use invitation used to onboard a new worker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeToken {
    pub token: String,
    pub name: Option<String>,
    pub expires_at: i64,
    pub used: bool,
    pub used_by: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl NodeToken {
    pub fn validate(&self, now: i64) -> Result<(), &'static str> {
        if self.used {
            return Err("token already used");
        }
        if self.expires_at > 0 && self.expires_at < now {
            return Err("token expired");
        }
        Ok(())
    }
}

/// Presence row: one (user, node) pair currently connected somewhere.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientOnline {
    pub client_name: String,
    pub node_id: String,
    pub inbound_tag: String,
    pub source_ip: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl ClientOnline {
    /// Rows older than this are considered stale per section 3.
    pub const STALE_AFTER_SECS: i64 = 60;

    pub fn is_stale(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        (now - self.last_seen).num_seconds() > Self::STALE_AFTER_SECS
    }
}
