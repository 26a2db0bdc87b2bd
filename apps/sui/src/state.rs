use crate::config::Mode;
use crate::config_service::ConfigService;
use crate::link_generator::{DefaultLinkGenerator, LinkGenerator};
use crate::tracker::{ConnectionTracker, StatsTracker, TimeTracker};
use crate::webhook::WebhookNotifier;
use std::sync::Arc;
use sui_db::repositories::{
    ApiKeyRepository, CatalogRepository, ChangeRepository, ClientRepository, NodeRepository,
    OnlineRepository, SettingsRepository, StatsRepository, WebhookRepository,
};

/// Everything an axum handler or background job needs. One instance per
/// process, cloned cheaply — every field is an `Arc`-backed handle or a
/// `Clone` repository wrapping a pooled connection.
#[derive(Clone)]
pub struct AppState {
    pub mode: Mode,
    pub local_node_id: String,

    pub clients: ClientRepository,
    pub catalog: CatalogRepository,
    pub settings: SettingsRepository,
    pub changes: ChangeRepository,
    pub nodes: NodeRepository,
    pub stats: StatsRepository,
    pub online: OnlineRepository,
    pub api_keys: ApiKeyRepository,
    pub webhooks: WebhookRepository,

    pub config_service: Arc<ConfigService>,
    pub webhook: WebhookNotifier,

    pub connections: ConnectionTracker,
    pub stats_tracker: Arc<StatsTracker>,
    pub time_tracker: Arc<TimeTracker>,
}

impl AppState {
    pub fn new(mode: Mode, local_node_id: String, pool: sqlx::PgPool, settings: SettingsRepository) -> Self {
        let clients = ClientRepository::new(pool.clone());
        let catalog = CatalogRepository::new(pool.clone());
        let changes = ChangeRepository::new(pool.clone());
        let nodes = NodeRepository::new(pool.clone());
        let stats = StatsRepository::new(pool.clone());
        let online = OnlineRepository::new(pool.clone());
        let api_keys = ApiKeyRepository::new(pool.clone());
        let webhooks = WebhookRepository::new(pool.clone());

        let webhook = WebhookNotifier::new(webhooks.clone());
        let link_generator: Arc<dyn LinkGenerator> = Arc::new(DefaultLinkGenerator);
        let config_service = Arc::new(ConfigService::new(
            clients.clone(),
            catalog.clone(),
            settings.clone(),
            changes.clone(),
            link_generator,
            mode == Mode::Worker,
        ));

        Self {
            mode,
            local_node_id,
            clients,
            catalog,
            settings,
            changes,
            nodes,
            stats,
            online,
            api_keys,
            webhooks,
            config_service,
            webhook,
            connections: ConnectionTracker::new(),
            stats_tracker: Arc::new(StatsTracker::new()),
            time_tracker: Arc::new(TimeTracker::new()),
        }
    }
}
