use crate::config_service::{ConfigAction, ConfigKey};
use crate::protocol_gen;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use sui_shared::{ApiEnvelope, WebhookEvent};

/// Bearer-key auth for the external integration surface (section 4.10). Every
/// handler below returns a plain `Response` rather than `impl IntoResponse`
/// precisely so success and error branches, which wrap different payload
/// types in `ApiEnvelope<T>`, can share one return type.
async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<(), Response> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| envelope_response(401, "missing X-API-Key header"))?;

    match state.api_keys.find_active(key).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(envelope_response(401, "invalid api key")),
        Err(e) => Err(envelope_response(e.http_status(), e.to_string())),
    }
}

fn envelope_response<M: Into<String>>(code: u16, message: M) -> Response {
    Json(ApiEnvelope::<()>::err(code, message)).into_response()
}

fn envelope_err(e: sui_db::DbError) -> Response {
    envelope_response(e.http_status(), e.to_string())
}

fn envelope_ok<T: Serialize>(value: T) -> Response {
    Json(ApiEnvelope::ok(value)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub expiry: i64,
    #[serde(default)]
    pub time_limit: i64,
    #[serde(default)]
    pub speed_limit: i64,
    #[serde(default)]
    pub device_limit: i32,
    #[serde(default)]
    pub traffic_reset_strategy: String,
    #[serde(default)]
    pub time_reset_strategy: String,
    #[serde(default)]
    pub inbounds: Vec<i64>,
}

/// `POST /api/v1/users` — the uuid is supplied by the caller, not generated
/// here: a third-party system assigns it as the stable external identity.
pub async fn create_user(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<CreateUserRequest>) -> Response {
    if let Err(resp) = authenticate(&headers, &state).await {
        return resp;
    }

    if req.uuid.trim().is_empty() || uuid::Uuid::parse_str(&req.uuid).is_err() {
        return envelope_response(400, "uuid must be a valid UUID");
    }

    match state.clients.uuid_taken(&req.uuid, None).await {
        Ok(true) => return envelope_response(409, format!("uuid {} already in use", req.uuid)),
        Ok(false) => {}
        Err(e) => return envelope_err(e),
    }

    let payload = serde_json::json!({
        "uuid": req.uuid,
        "name": req.name,
        "enable": true,
        "volume": req.volume,
        "expiry": req.expiry,
        "time_limit": req.time_limit,
        "speed_limit": req.speed_limit,
        "device_limit": req.device_limit,
        "traffic_reset_strategy": req.traffic_reset_strategy,
        "time_reset_strategy": req.time_reset_strategy,
        "inbounds": req.inbounds,
        "config": protocol_gen::generate_client_config(&req.uuid),
    });

    match state.config_service.save(ConfigKey::Clients, ConfigAction::New, payload, "external_api", "api").await {
        Ok(_) => match state.clients.get_by_uuid(&req.uuid).await {
            Ok(c) => envelope_ok(c),
            Err(e) => envelope_err(e),
        },
        Err(e) => envelope_err(e.0),
    }
}

/// `GET /api/v1/users/:uuid`
pub async fn get_user(State(state): State<AppState>, headers: HeaderMap, Path(uuid): Path<String>) -> Response {
    if let Err(resp) = authenticate(&headers, &state).await {
        return resp;
    }
    match state.clients.get_by_uuid(&uuid).await {
        Ok(c) => envelope_ok(c),
        Err(e) => envelope_err(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub enable: Option<bool>,
    pub volume: Option<i64>,
    pub expiry: Option<i64>,
    pub time_limit: Option<i64>,
    pub speed_limit: Option<i64>,
    pub device_limit: Option<i32>,
    pub inbounds: Option<Vec<i64>>,
}

/// `PUT /api/v1/users/:uuid`
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Response {
    if let Err(resp) = authenticate(&headers, &state).await {
        return resp;
    }
    let existing = match state.clients.get_by_uuid(&uuid).await {
        Ok(c) => c,
        Err(e) => return envelope_err(e),
    };

    let payload = serde_json::json!({
        "id": existing.id,
        "uuid": existing.uuid,
        "name": req.name.unwrap_or(existing.name),
        "enable": req.enable.unwrap_or(existing.enable),
        "volume": req.volume.unwrap_or(existing.volume),
        "expiry": req.expiry.unwrap_or(existing.expiry),
        "time_limit": req.time_limit.unwrap_or(existing.time_limit),
        "speed_limit": req.speed_limit.unwrap_or(existing.speed_limit),
        "device_limit": req.device_limit.unwrap_or(existing.device_limit),
        "traffic_reset_strategy": existing.traffic_reset_strategy,
        "time_reset_strategy": existing.time_reset_strategy,
        "inbounds": req.inbounds.unwrap_or_else(|| existing.inbound_ids()),
        "config": existing.config,
    });

    match state.config_service.save(ConfigKey::Clients, ConfigAction::Edit, payload, "external_api", "api").await {
        Ok(_) => match state.clients.get_by_uuid(&uuid).await {
            Ok(c) => envelope_ok(c),
            Err(e) => envelope_err(e),
        },
        Err(e) => envelope_err(e.0),
    }
}

/// `DELETE /api/v1/users/:uuid`
pub async fn delete_user(State(state): State<AppState>, headers: HeaderMap, Path(uuid): Path<String>) -> Response {
    if let Err(resp) = authenticate(&headers, &state).await {
        return resp;
    }
    let existing = match state.clients.get_by_uuid(&uuid).await {
        Ok(c) => c,
        Err(e) => return envelope_err(e),
    };
    match state
        .config_service
        .save(ConfigKey::Clients, ConfigAction::Del, serde_json::json!({ "id": existing.id }), "external_api", "api")
        .await
    {
        Ok(_) => envelope_ok(()),
        Err(e) => envelope_err(e.0),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum UserAction {
    Enable,
    Disable,
    ResetTraffic,
    ResetTime,
}

/// `POST /api/v1/users/:uuid/{enable|disable|reset-traffic|reset-time}`
pub async fn perform_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    action: UserAction,
) -> Response {
    if let Err(resp) = authenticate(&headers, &state).await {
        return resp;
    }
    let existing = match state.clients.get_by_uuid(&uuid).await {
        Ok(c) => c,
        Err(e) => return envelope_err(e),
    };

    let result = match action {
        UserAction::Enable => state.clients.set_enable(existing.id, true).await,
        UserAction::Disable => {
            let r = state.clients.set_enable(existing.id, false).await;
            if r.is_ok() {
                state
                    .webhook
                    .send_event(WebhookEvent::UserDisabled, serde_json::json!({ "name": existing.name, "uuid": existing.uuid }))
                    .await;
            }
            r
        }
        UserAction::ResetTraffic => {
            let next = existing.traffic_reset_strategy().next_reset_at(chrono::Utc::now().timestamp());
            state.clients.reset_traffic(existing.id, next).await
        }
        UserAction::ResetTime => {
            let next = existing.time_reset_strategy().next_reset_at(chrono::Utc::now().timestamp());
            state.clients.reset_time(existing.id, next).await
        }
    };

    match result {
        Ok(_) => envelope_ok(()),
        Err(e) => envelope_err(e),
    }
}

pub async fn enable_user(state: State<AppState>, headers: HeaderMap, path: Path<String>) -> Response {
    perform_action(state, headers, path, UserAction::Enable).await
}
pub async fn disable_user(state: State<AppState>, headers: HeaderMap, path: Path<String>) -> Response {
    perform_action(state, headers, path, UserAction::Disable).await
}
pub async fn reset_traffic(state: State<AppState>, headers: HeaderMap, path: Path<String>) -> Response {
    perform_action(state, headers, path, UserAction::ResetTraffic).await
}
pub async fn reset_time(state: State<AppState>, headers: HeaderMap, path: Path<String>) -> Response {
    perform_action(state, headers, path, UserAction::ResetTime).await
}
