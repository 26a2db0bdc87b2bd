use hmac::{Hmac, Mac};
use sha2::Sha256;
use sui_db::repositories::api_key_repo::WebhookRepository;
use sui_shared::{WebhookEvent, WebhookPayload};

type HmacSha256 = Hmac<Sha256>;

/// Fires lifecycle events at the configured callback URL (section 4.9).
/// Delivery is best-effort: failures are logged at warning and never retried,
/// matching the spec's explicit non-goal of a durable outbound queue.
#[derive(Clone)]
pub struct WebhookNotifier {
    webhooks: WebhookRepository,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhooks: WebhookRepository) -> Self {
        Self {
            webhooks,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build webhook http client"),
        }
    }

    pub async fn send_event(&self, event: WebhookEvent, data: serde_json::Value) {
        let config = match self.webhooks.get().await {
            Ok(Some(c)) if c.enable && !c.url.is_empty() => c,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load webhook config");
                return;
            }
        };

        let payload = WebhookPayload {
            event: event.as_str(),
            timestamp: chrono::Utc::now().timestamp(),
            data,
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize webhook payload");
                return;
            }
        };

        let mut req = self.http.post(&config.url).header("Content-Type", "application/json");
        if let Some(secret) = config.secret.as_deref().filter(|s| !s.is_empty()) {
            match sign(secret, &body) {
                Ok(sig) => req = req.header("X-Webhook-Signature", sig),
                Err(e) => tracing::warn!(error = %e, "failed to sign webhook payload"),
            }
        }

        match req.body(body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = %resp.status(), event = event.as_str(), "webhook delivery rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, event = event.as_str(), "webhook delivery failed");
            }
            Ok(_) => {}
        }
    }
}

fn sign(secret: &str, body: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_hex() {
        let a = sign("secret", b"body").unwrap();
        let b = sign("secret", b"body").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = sign("secret-a", b"body").unwrap();
        let b = sign("secret-b", b"body").unwrap();
        assert_ne!(a, b);
    }
}
