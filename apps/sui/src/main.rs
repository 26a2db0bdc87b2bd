mod api;
mod config;
mod config_service;
mod error;
mod link_generator;
mod node_registry;
mod protocol_gen;
mod quota_engine;
mod scheduler;
mod server;
mod state;
mod subscription;
mod sync_client;
mod tracker;
mod webhook;

use clap::Parser;
use config::{AdminCommands, Cli, Commands, Mode};
use state::AppState;
use std::sync::Arc;
use sui_db::repositories::{ApiKeyRepository, ChangeRepository, ClientRepository, NodeRepository, SettingsRepository};
use tokio::sync::watch;
use tracing::info;

/// `reqwest`'s `rustls-no-provider` feature needs a process-level
/// `CryptoProvider` installed before the first TLS connection, or it panics.
fn init_rustls_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_rustls_provider();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    cli.validate()?;

    let env_filter = if cli.debug {
        "debug".to_string()
    } else {
        cli.log_level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::try_new(&env_filter).unwrap_or_else(|_| "info".into())).init();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = sui_db::connect(&database_url).await?;
    let settings = SettingsRepository::new(pool.clone()).await?;

    if let Some(command) = &cli.command {
        return run_command(command, pool, settings).await;
    }

    let local_node_id = cli.node_id.clone().unwrap_or_else(|| "local".to_string());
    let state = AppState::new(cli.mode, local_node_id.clone(), pool.clone(), settings.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Arc::new(scheduler::Scheduler::new(
        cli.mode,
        pool.clone(),
        state.connections.clone(),
        state.stats_tracker.clone(),
        state.time_tracker.clone(),
        quota_engine::QuotaEngine::new(
            state.clients.clone(),
            state.stats.clone(),
            state.changes.clone(),
            state.settings.clone(),
            state.webhook.clone(),
            local_node_id.clone(),
        ),
        if cli.mode == Mode::Standalone || cli.mode == Mode::Master {
            Some(state.nodes.clone())
        } else {
            None
        },
        cli.mode != Mode::Worker,
    ));
    scheduler.spawn(shutdown_rx.clone());

    if cli.mode == Mode::Worker {
        let sync_client = Arc::new(
            sync_client::SyncClient::bootstrap(
                &cli,
                pool.clone(),
                state.clients.clone(),
                state.catalog.clone(),
                state.settings.clone(),
                state.stats.clone(),
                state.online.clone(),
                state.connections.clone(),
            )
            .await?,
        );
        sync_client.spawn(shutdown_rx.clone());
    }

    let app = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!(addr = %cli.listen, mode = ?cli.mode, "sui listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

async fn run_command(command: &Commands, pool: sqlx::PgPool, settings: SettingsRepository) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            info!("migrations applied on connect");
            Ok(())
        }
        Commands::Setting { key, value } => {
            match value {
                Some(v) => {
                    settings.set(key, v).await?;
                    println!("{key} = {v}");
                }
                None => match settings.get(key).await {
                    Some(v) => println!("{key} = {v}"),
                    None => println!("{key} is unset"),
                },
            }
            Ok(())
        }
        Commands::Uri { uuid_or_name } => {
            let clients = ClientRepository::new(pool.clone());
            let client = clients
                .find_by_uuid_or_name(uuid_or_name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such client: {uuid_or_name}"))?;
            let links: Vec<sui_db::models::ClientLink> = serde_json::from_value(client.links).unwrap_or_default();
            for link in links {
                println!("{}: {}", link.remark, link.uri);
            }
            Ok(())
        }
        Commands::Admin { action } => run_admin_command(action, pool).await,
    }
}

async fn run_admin_command(action: &AdminCommands, pool: sqlx::PgPool) -> anyhow::Result<()> {
    match action {
        AdminCommands::MintToken { name, expires_in_secs } => {
            let nodes = NodeRepository::new(pool);
            let expires_at = if *expires_in_secs > 0 {
                chrono::Utc::now().timestamp() + expires_in_secs
            } else {
                0
            };
            let invite = nodes.mint_token(name.as_deref(), expires_at).await?;
            println!("token: {}", invite.token);
            Ok(())
        }
        AdminCommands::CreateApiKey { name } => {
            let api_keys = ApiKeyRepository::new(pool);
            let key: String = {
                use rand::Rng;
                use rand::distr::Alphanumeric;
                rand::rng().sample_iter(&Alphanumeric).take(40).map(char::from).collect()
            };
            let created = api_keys.create(name, &key).await?;
            println!("api key for {}: {}", created.name, created.key);
            Ok(())
        }
        AdminCommands::RecentChanges { limit } => {
            let changes = ChangeRepository::new(pool);
            for change in changes.recent(*limit).await? {
                println!("{} {} {} {} {}", change.date_time, change.actor, change.key, change.action, change.obj);
            }
            Ok(())
        }
    }
}
