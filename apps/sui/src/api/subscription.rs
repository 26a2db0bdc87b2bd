use crate::config::Mode;
use crate::state::AppState;
use crate::subscription as sub;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::error;

/// `GET /sub/:key` (section 6, "Subscription URL"). `key` is the client uuid,
/// falling back to name for older links (C11).
pub async fn get_subscription(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let client = match state.clients.find_by_uuid_or_name(&key).await {
        Ok(Some(c)) => c,
        Ok(None) => return (StatusCode::NOT_FOUND, "unknown subscription").into_response(),
        Err(e) => {
            error!(key = %key, error = %e, "subscription lookup failed");
            return (StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), e.to_string()).into_response();
        }
    };

    let nodes = if state.mode == Mode::Worker {
        Vec::new()
    } else {
        match state.nodes.list_enabled().await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "node list lookup failed while building subscription");
                return (StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), e.to_string()).into_response();
            }
        }
    };

    let links = sub::build_links(&client, &nodes);
    let update_interval = state.settings.get("subscription_update_interval").await.unwrap_or_else(|| "24".to_string());
    let body = sub::encode_subscription(&links, true);
    let userinfo = format!(
        "upload={}; download={}; total={}; expire={}",
        client.up, client.down, client.volume, client.expiry
    );

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("Profile-Update-Interval", update_interval)
        .header("Subscription-Userinfo", userinfo);

    if let Some(tag) = sub::info_tag(&client, Utc::now().timestamp()) {
        builder = builder.header("Profile-Title", format!("{}-{}", client.name, tag));
    } else {
        builder = builder.header("Profile-Title", client.name.clone());
    }

    builder.body(body).unwrap().into_response()
}
