//! Wire types shared by the worker (`sui --mode worker`) and the master/standalone
//! HTTP surface. Kept dependency-light (serde only) so both sides can pull in the
//! same crate without dragging sqlx across the process boundary.

use serde::{Deserialize, Serialize};

/// `POST /node/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub token: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub name: String,
    pub address: Option<String>,
    #[serde(rename = "externalHost")]
    pub external_host: Option<String>,
    #[serde(rename = "externalPort")]
    pub external_port: Option<u16>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponseBody {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub msg: String,
    pub obj: Option<RegisterResponseBody>,
}

/// `GET /node/config/version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigVersionResponse {
    pub success: bool,
    pub version: i64,
}

/// `GET /node/config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub obj: crate::config::ConfigSnapshot,
}

/// One row of `POST /node/stats`. `direction` is serialized as a bool per the wire
/// table in the spec: `true` means upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsPushItem {
    #[serde(rename = "dateTime")]
    pub date_time: i64,
    pub resource: String,
    pub tag: String,
    pub direction: bool,
    pub traffic: i64,
}

/// `POST /node/onlines`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineEntry {
    pub user: String,
    #[serde(rename = "inboundTag")]
    pub inbound_tag: String,
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "connectedAt")]
    pub connected_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlinesPushRequest {
    pub onlines: Vec<OnlineEntry>,
}

/// `POST /node/heartbeat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub cpu: f64,
    pub memory: f64,
    pub connections: u32,
    pub version: String,
    #[serde(rename = "externalHost")]
    pub external_host: Option<String>,
    #[serde(rename = "externalPort")]
    pub external_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
}

/// Generic response envelope used by the external integration API (C10).
/// `code = 0` on success, `code = <http-status>` on error, mirroring the
/// convention the panel's own JSON handlers already use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn err(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
