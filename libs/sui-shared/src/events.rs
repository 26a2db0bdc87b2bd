use serde::{Deserialize, Serialize};

/// Lifecycle events the webhook notifier (C9) can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    TrafficExceeded,
    TimeExceeded,
    UserExpired,
    TrafficReset,
    TimeReset,
    UserDisabled,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::TrafficExceeded => "traffic_exceeded",
            WebhookEvent::TimeExceeded => "time_exceeded",
            WebhookEvent::UserExpired => "user_expired",
            WebhookEvent::TrafficReset => "traffic_reset",
            WebhookEvent::TimeReset => "time_reset",
            WebhookEvent::UserDisabled => "user_disabled",
        }
    }
}

/// Body POSTed to the configured callback URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: &'static str,
    pub timestamp: i64,
    pub data: serde_json::Value,
}
