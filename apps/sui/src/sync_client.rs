use crate::config::Cli;
use crate::tracker::ConnectionTracker;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sui_db::models::{CatalogEntry, CatalogKind, Client};
use sui_db::repositories::{CatalogRepository, ClientRepository, OnlineRepository, SettingsRepository, StatsRepository};
use sui_shared::{
    ConfigResponse, ConfigVersionResponse, HeartbeatRequest, HeartbeatResponse, OnlineEntry,
    OnlinesPushRequest, RegisterRequest, RegisterResponse, StatsPushItem,
};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

const PENDING_STATS_CAP: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeCredential {
    node_id: String,
    token: String,
}

/// Worker-side agent (C7): registers once, then keeps its local catalog and
/// presence in sync with the master over plain HTTP polling.
pub struct SyncClient {
    http: reqwest::Client,
    master: String,
    node_id: String,
    token: String,
    credential_path: PathBuf,
    local_version: std::sync::atomic::AtomicI64,
    pending_stats: Mutex<Vec<StatsPushItem>>,

    pool: PgPool,
    clients: ClientRepository,
    catalog: CatalogRepository,
    settings: SettingsRepository,
    stats: StatsRepository,
    online: OnlineRepository,
    connections: ConnectionTracker,

    sync_config_interval: u64,
    sync_stats_interval: u64,
}

impl SyncClient {
    /// Reads the persisted credential file if present, otherwise registers a
    /// brand-new node with the master using the enrollment token the operator
    /// supplied on the CLI.
    pub async fn bootstrap(
        cli: &Cli,
        pool: PgPool,
        clients: ClientRepository,
        catalog: CatalogRepository,
        settings: SettingsRepository,
        stats: StatsRepository,
        online: OnlineRepository,
        connections: ConnectionTracker,
    ) -> anyhow::Result<Self> {
        let master = cli
            .master
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--master is required in worker mode"))?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        let credential_path = PathBuf::from(&cli.db_folder).join("node_credential.json");

        let (node_id, token) = if let Some(existing) = Self::load_credential(&credential_path).await {
            info!(node_id = %existing.node_id, "reusing persisted node credential");
            match Self::verify_credential(&http, &master, &existing).await {
                Ok(()) => (existing.node_id, existing.token),
                Err(e) => {
                    warn!(error = %e, "persisted credential rejected by master, re-registering");
                    Self::register(&http, &master, cli).await?
                }
            }
        } else {
            Self::register(&http, &master, cli).await?
        };

        let credential = NodeCredential { node_id: node_id.clone(), token: token.clone() };
        Self::save_credential(&credential_path, &credential).await?;

        Ok(Self {
            http,
            master,
            node_id,
            token,
            credential_path,
            local_version: std::sync::atomic::AtomicI64::new(0),
            pending_stats: Mutex::new(Vec::new()),
            pool,
            clients,
            catalog,
            settings,
            stats,
            online,
            connections,
            sync_config_interval: cli.sync_config_interval,
            sync_stats_interval: cli.sync_stats_interval,
        })
    }

    async fn load_credential(path: &PathBuf) -> Option<NodeCredential> {
        let bytes = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn save_credential(path: &PathBuf, credential: &NodeCredential) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(credential)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn verify_credential(http: &reqwest::Client, master: &str, credential: &NodeCredential) -> anyhow::Result<()> {
        let resp = http
            .get(format!("{master}/node/config/version"))
            .header("X-Node-Id", &credential.node_id)
            .header("X-Node-Token", &credential.token)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("master rejected stored credential with status {}", resp.status());
        }
        Ok(())
    }

    async fn register(http: &reqwest::Client, master: &str, cli: &Cli) -> anyhow::Result<(String, String)> {
        let token = cli.token.clone().ok_or_else(|| anyhow::anyhow!("--token is required in worker mode"))?;
        let node_id = cli.node_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let name = cli.node_name.clone().unwrap_or_else(|| node_id.clone());

        let req = RegisterRequest {
            token,
            node_id,
            name,
            address: None,
            external_host: cli.external_host.clone(),
            external_port: cli.external_port,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let resp: RegisterResponse = http.post(format!("{master}/node/register")).json(&req).send().await?.json().await?;
        if !resp.success {
            anyhow::bail!("registration rejected: {}", resp.msg);
        }
        let body = resp.obj.ok_or_else(|| anyhow::anyhow!("registration succeeded but master returned no credential"))?;
        info!(node_id = %body.node_id, "registered with master");
        Ok((body.node_id, body.token))
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("X-Node-Id", &self.node_id).header("X-Node-Token", &self.token)
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let config_this = self.clone();
        let mut config_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(config_this.sync_config_interval));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = config_this.sync_config_once().await {
                            warn!(error = %e, "config sync failed, keeping last-known-good local state");
                        }
                    }
                    _ = config_shutdown.changed() => break,
                }
            }
        });

        let stats_this = self.clone();
        let mut stats_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(stats_this.sync_stats_interval));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = stats_this.push_stats_once().await {
                            warn!(error = %e, "stats push failed");
                        }
                        if let Err(e) = stats_this.push_onlines_once().await {
                            warn!(error = %e, "presence push failed");
                        }
                    }
                    _ = stats_shutdown.changed() => break,
                }
            }
        });

        let hb_this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut sys = sysinfo::System::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = hb_this.heartbeat_once(&mut sys).await {
                            warn!(error = %e, "heartbeat failed");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Pulls `/node/config/version`; on change, pulls the full snapshot and
    /// applies it to the local database in one transaction (section 4.7).
    async fn sync_config_once(&self) -> anyhow::Result<()> {
        let version_resp: ConfigVersionResponse = self
            .auth(self.http.get(format!("{}/node/config/version", self.master)))
            .send()
            .await?
            .json()
            .await?;

        let current = self.local_version.load(std::sync::atomic::Ordering::Relaxed);
        if version_resp.version == current {
            return Ok(());
        }

        let config_resp: ConfigResponse = self
            .auth(self.http.get(format!("{}/node/config", self.master)))
            .send()
            .await?
            .json()
            .await?;
        let snapshot = config_resp.obj;

        let clients: Vec<Client> = snapshot
            .clients
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        let mut tx = self.pool.begin().await?;
        ClientRepository::replace_all(&mut tx, &clients).await?;
        for (kind, entries) in [
            (CatalogKind::Inbounds, &snapshot.inbounds),
            (CatalogKind::Outbounds, &snapshot.outbounds),
            (CatalogKind::Tls, &snapshot.tls),
            (CatalogKind::Services, &snapshot.services),
            (CatalogKind::Endpoints, &snapshot.endpoints),
        ] {
            let rows: Vec<CatalogEntry> = entries.iter().filter_map(|v| serde_json::from_value(v.clone()).ok()).collect();
            CatalogRepository::replace_all(&mut tx, kind, &rows).await?;
        }
        tx.commit().await?;

        if let Some(settings_obj) = snapshot.settings.as_object() {
            for (key, value) in settings_obj {
                if let Some(s) = value.as_str() {
                    self.settings.set(key, s).await?;
                }
            }
        }

        self.local_version.store(version_resp.version, std::sync::atomic::Ordering::Relaxed);
        info!(version = version_resp.version, "applied new config snapshot, data plane should reload");
        Ok(())
    }

    /// Reads recent local stats for this node, prepends anything buffered
    /// from a previous failed push, and tries again.
    async fn push_stats_once(&self) -> anyhow::Result<()> {
        let since = chrono::Utc::now() - chrono::Duration::seconds(2 * self.sync_stats_interval as i64);
        let rows = self.stats.newer_than_for_node(&self.node_id, since).await?;

        let mut batch: Vec<StatsPushItem> = {
            let mut pending = self.pending_stats.lock().await;
            std::mem::take(&mut *pending)
        };
        batch.extend(rows.iter().map(|r| StatsPushItem {
            date_time: r.date_time.timestamp(),
            resource: r.resource.clone(),
            tag: r.tag.clone(),
            direction: r.direction == "up",
            traffic: r.traffic,
        }));

        if batch.is_empty() {
            return Ok(());
        }

        // Delete exactly the rows this batch reports, bounded by the latest
        // date_time actually read — never a timestamp taken after the push,
        // which would also sweep up rows inserted concurrently with it.
        let through = batch.iter().map(|item| item.date_time).max().expect("batch is non-empty");
        let through = chrono::DateTime::from_timestamp(through, 0).unwrap_or_else(chrono::Utc::now);

        let resp = self.auth(self.http.post(format!("{}/node/stats", self.master)).json(&batch)).send().await;
        match resp {
            Ok(r) if r.status().is_success() => {
                self.stats.delete_for_node_through(&self.node_id, through).await?;
                Ok(())
            }
            Ok(r) => {
                self.requeue_stats(batch).await;
                anyhow::bail!("master rejected stats push with status {}", r.status())
            }
            Err(e) => {
                self.requeue_stats(batch).await;
                Err(e.into())
            }
        }
    }

    async fn requeue_stats(&self, mut batch: Vec<StatsPushItem>) {
        let mut pending = self.pending_stats.lock().await;
        pending.append(&mut batch);
        if pending.len() > PENDING_STATS_CAP {
            let overflow = pending.len() - PENDING_STATS_CAP;
            pending.drain(0..overflow);
        }
    }

    /// Builds a deduplicated `(user, sourceIP)` presence list from the live
    /// connection tracker and replaces this node's slice on the master.
    async fn push_onlines_once(&self) -> anyhow::Result<()> {
        let snapshot = self.connections.snapshot();
        let mut seen = std::collections::HashSet::new();
        let mut onlines = Vec::new();
        for entry in snapshot {
            let key = (entry.user.clone(), entry.source_ip.clone());
            if !seen.insert(key) {
                continue;
            }
            onlines.push(OnlineEntry {
                user: entry.user,
                inbound_tag: entry.inbound,
                source_ip: entry.source_ip,
                connected_at: entry.connected_at.timestamp(),
            });
        }

        let req = OnlinesPushRequest { onlines };
        let resp = self.auth(self.http.post(format!("{}/node/onlines", self.master)).json(&req)).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("master rejected presence push with status {}", resp.status());
        }
        Ok(())
    }

    async fn heartbeat_once(&self, sys: &mut sysinfo::System) -> anyhow::Result<()> {
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        let cpu = sys.global_cpu_usage() as f64;
        let memory = if sys.total_memory() > 0 {
            sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
        } else {
            0.0
        };

        let req = HeartbeatRequest {
            cpu,
            memory,
            connections: self.connections.snapshot().len() as u32,
            version: env!("CARGO_PKG_VERSION").to_string(),
            external_host: None,
            external_port: None,
        };

        let _resp: HeartbeatResponse = self
            .auth(self.http.post(format!("{}/node/heartbeat", self.master)).json(&req))
            .send()
            .await?
            .json()
            .await?;
        Ok(())
    }

    /// Drops the credential file, forcing a fresh registration on next start.
    /// Exposed for operators who need to move a worker under a new token.
    #[allow(dead_code)]
    pub async fn forget_credential(&self) -> anyhow::Result<()> {
        if tokio::fs::try_exists(&self.credential_path).await.unwrap_or(false) {
            tokio::fs::remove_file(&self.credential_path).await?;
        }
        Ok(())
    }
}
