use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Bearer credential for the external integration surface (C10).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub enable: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Singleton webhook destination + HMAC secret.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookConfig {
    pub id: i64,
    pub enable: bool,
    pub url: String,
    pub secret: Option<String>,
}
