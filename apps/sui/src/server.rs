use crate::api::{external, node, subscription};
use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full HTTP surface: the node protocol (C6), the external
/// integration API (C10), and the subscription endpoint (C11). All three
/// share one `AppState` and are always mounted, even in worker mode, since a
/// worker still serves subscriptions for clients connected to it directly.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/node/register", post(node::register))
        .route("/node/config/version", get(node::config_version))
        .route("/node/config", get(node::get_config))
        .route("/node/stats", post(node::push_stats))
        .route("/node/onlines", post(node::push_onlines))
        .route("/node/heartbeat", post(node::heartbeat))
        .route("/api/v1/users", post(external::create_user))
        .route("/api/v1/users/{uuid}", get(external::get_user))
        .route("/api/v1/users/{uuid}", put(external::update_user))
        .route("/api/v1/users/{uuid}", delete(external::delete_user))
        .route("/api/v1/users/{uuid}/enable", post(external::enable_user))
        .route("/api/v1/users/{uuid}/disable", post(external::disable_user))
        .route("/api/v1/users/{uuid}/reset-traffic", post(external::reset_traffic))
        .route("/api/v1/users/{uuid}/reset-time", post(external::reset_time))
        .route("/sub/{key}", get(subscription::get_subscription))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
