use crate::error::AppError;
use crate::node_registry;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use sui_shared::{
    ConfigResponse, ConfigVersionResponse, HeartbeatRequest, HeartbeatResponse, OnlinesPushRequest,
    RegisterRequest, RegisterResponse, RegisterResponseBody, StatsPushItem,
};

/// `POST /node/register` — unauthenticated; the token itself is the credential.
pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> impl IntoResponse {
    match state
        .nodes
        .register(
            &req.token,
            &req.node_id,
            &req.name,
            req.address.as_deref(),
            req.external_host.as_deref(),
            req.external_port.map(i32::from),
            &req.version,
        )
        .await
    {
        Ok(node) => Json(RegisterResponse {
            success: true,
            msg: "registered".to_string(),
            obj: Some(RegisterResponseBody {
                node_id: node.node_id,
                token: node.token,
            }),
        })
        .into_response(),
        Err(e) => Json(RegisterResponse {
            success: false,
            msg: e.to_string(),
            obj: None,
        })
        .into_response(),
    }
}

/// `GET /node/config/version`
pub async fn config_version(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, AppError> {
    node_registry::authenticate(&headers, &state.nodes).await?;
    Ok(Json(ConfigVersionResponse {
        success: true,
        version: state.settings.config_version(),
    }))
}

/// `GET /node/config` — full catalog snapshot; marks the calling node synced.
pub async fn get_config(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, AppError> {
    let node = node_registry::authenticate(&headers, &state.nodes).await?;

    let clients = state.clients.list().await?.into_iter().map(|c| serde_json::to_value(c).unwrap()).collect();
    let inbounds = state.catalog.list(sui_db::models::CatalogKind::Inbounds).await?;
    let outbounds = state.catalog.list(sui_db::models::CatalogKind::Outbounds).await?;
    let tls = state.catalog.list(sui_db::models::CatalogKind::Tls).await?;
    let services = state.catalog.list(sui_db::models::CatalogKind::Services).await?;
    let endpoints = state.catalog.list(sui_db::models::CatalogKind::Endpoints).await?;

    let to_json = |v: Vec<sui_db::models::CatalogEntry>| v.into_iter().map(|e| serde_json::to_value(e).unwrap()).collect();

    let settings = serde_json::to_value(state.settings.all().await).unwrap_or_else(|_| serde_json::json!({}));

    let snapshot = sui_shared::ConfigSnapshot {
        version: state.settings.config_version(),
        clients,
        inbounds: to_json(inbounds),
        outbounds: to_json(outbounds),
        tls: to_json(tls),
        services: to_json(services),
        endpoints: to_json(endpoints),
        settings,
    };

    state.nodes.mark_synced(&node.node_id).await?;

    Ok(Json(ConfigResponse {
        success: true,
        obj: snapshot,
    }))
}

/// `POST /node/stats` — stamps every row with the *calling* node id, never the
/// client's claim, and applies the same user-counter updates as `drainStats`.
pub async fn push_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(rows): Json<Vec<StatsPushItem>>,
) -> Result<impl IntoResponse, AppError> {
    let node = node_registry::authenticate(&headers, &state.nodes).await?;

    for row in &rows {
        let direction = if row.direction { "up" } else { "down" };
        let date_time = chrono::DateTime::from_timestamp(row.date_time, 0).unwrap_or_else(chrono::Utc::now);
        state.stats.insert_batch(&[(date_time, row.resource.clone(), row.tag.clone(), direction.to_string(), row.traffic, node.node_id.clone())]).await?;

        if row.resource == "user" {
            let (up, down) = if row.direction { (row.traffic, 0) } else { (0, row.traffic) };
            state.clients.add_traffic_by_name(&row.tag, up, down).await?;
        }
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// `POST /node/onlines` — replaces the calling node's entire presence slice.
pub async fn push_onlines(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OnlinesPushRequest>,
) -> Result<impl IntoResponse, AppError> {
    let node = node_registry::authenticate(&headers, &state.nodes).await?;

    let rows: Vec<(String, String, String, chrono::DateTime<chrono::Utc>)> = req
        .onlines
        .into_iter()
        .map(|o| {
            (
                o.user,
                o.inbound_tag,
                o.source_ip,
                chrono::DateTime::from_timestamp(o.connected_at, 0).unwrap_or_else(chrono::Utc::now),
            )
        })
        .collect();

    state.online.replace_for_node(&node.node_id, &rows).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `POST /node/heartbeat`
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<HeartbeatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let node = node_registry::authenticate(&headers, &state.nodes).await?;
    state
        .nodes
        .ingest_heartbeat(&node.node_id, &req.version, req.external_host.as_deref(), req.external_port.map(i32::from))
        .await?;
    Ok(Json(HeartbeatResponse { success: true }))
}
