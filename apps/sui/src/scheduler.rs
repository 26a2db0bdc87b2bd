use crate::config::Mode;
use crate::quota_engine::QuotaEngine;
use crate::tracker::{ConnectionTracker, StatsTracker, TimeTracker};
use std::sync::Arc;
use std::time::Duration;
use sui_db::repositories::NodeRepository;
use tokio::sync::watch;
use tracing::{error, info, warn};

const STATS_DRAIN_INTERVAL: Duration = Duration::from_secs(10);
const TIME_ACCRUE_INTERVAL: Duration = Duration::from_secs(10);
const DEPLETE_INTERVAL: Duration = Duration::from_secs(60);
const NODE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(5);
const DAILY_INTERVAL: Duration = Duration::from_secs(86_400);
const STATS_RETENTION_DAYS: i64 = 30;

/// Cooperative fixed-interval dispatcher (section 4.5). Each job runs on its
/// own `tokio::time::interval`; a slow tick does not stack — `interval()`
/// drops missed ticks rather than bursting. `deplete` and `reset` are
/// master-only per the spec's open question: the source starts them
/// unconditionally, this implementation gates them on mode.
pub struct Scheduler {
    mode: Mode,
    pool: sqlx::PgPool,
    connections: ConnectionTracker,
    stats_tracker: Arc<StatsTracker>,
    time_tracker: Arc<TimeTracker>,
    quota: QuotaEngine,
    nodes: Option<NodeRepository>,
    enable_traffic_record: bool,
}

impl Scheduler {
    pub fn new(
        mode: Mode,
        pool: sqlx::PgPool,
        connections: ConnectionTracker,
        stats_tracker: Arc<StatsTracker>,
        time_tracker: Arc<TimeTracker>,
        quota: QuotaEngine,
        nodes: Option<NodeRepository>,
        enable_traffic_record: bool,
    ) -> Self {
        Self {
            mode,
            pool,
            connections,
            stats_tracker,
            time_tracker,
            quota,
            nodes,
            enable_traffic_record,
        }
    }

    /// Spawns every job as its own task, returning immediately. All tasks stop
    /// once `shutdown` fires.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        Self::spawn_job("stats-drain", STATS_DRAIN_INTERVAL, shutdown.clone(), {
            let this = self.clone();
            move || {
                let this = this.clone();
                async move {
                    if let Err(e) = this.quota.drain_stats(&this.stats_tracker, this.enable_traffic_record).await {
                        warn!(error = %e, "stats drain failed");
                    }
                }
            }
        });

        Self::spawn_job("time-accrue", TIME_ACCRUE_INTERVAL, shutdown.clone(), {
            let this = self.clone();
            move || {
                let this = this.clone();
                async move {
                    this.time_tracker.tick(&this.connections.online_users(), TIME_ACCRUE_INTERVAL.as_secs() as i64);
                    if let Err(e) = this.quota.accrue_time(&this.time_tracker).await {
                        warn!(error = %e, "time accrue failed");
                    }
                }
            }
        });

        Self::spawn_job("healthcheck", HEALTHCHECK_INTERVAL, shutdown.clone(), {
            let this = self.clone();
            move || {
                let this = this.clone();
                async move {
                    let online = this.connections.online_users().len();
                    match sqlx::query("SELECT 1").execute(&this.pool).await {
                        Ok(_) => tracing::debug!(online_users = online, "healthcheck ok"),
                        Err(e) => error!(error = %e, "healthcheck: database unreachable"),
                    }
                }
            }
        });

        if self.mode != Mode::Worker {
            Self::spawn_job("deplete", DEPLETE_INTERVAL, shutdown.clone(), {
                let this = self.clone();
                move || {
                    let this = this.clone();
                    async move {
                        match this.quota.deplete_exhausted().await {
                            Ok(affected) if !affected.is_empty() => info!(count = affected.len(), "disabled exhausted clients"),
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "deplete tick failed"),
                        }
                    }
                }
            });

            Self::spawn_job("reset", DAILY_INTERVAL, shutdown.clone(), {
                let this = self.clone();
                move || {
                    let this = this.clone();
                    async move {
                        if let Err(e) = this.quota.reset_by_strategy().await {
                            warn!(error = %e, "reset tick failed");
                        }
                    }
                }
            });

            Self::spawn_job("stats-purge", DAILY_INTERVAL, shutdown.clone(), {
                let this = self.clone();
                move || {
                    let this = this.clone();
                    async move {
                        match this.quota.delete_old_stats(STATS_RETENTION_DAYS).await {
                            Ok(n) if n > 0 => info!(rows = n, "purged old stats"),
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "stats purge failed"),
                        }
                    }
                }
            });

            if let Some(nodes) = self.nodes.clone() {
                Self::spawn_job("node-sweep", NODE_SWEEP_INTERVAL, shutdown.clone(), move || {
                    let nodes = nodes.clone();
                    async move {
                        match nodes.list_enabled().await {
                            Ok(all) => {
                                let now = chrono::Utc::now();
                                for node in all {
                                    if let Some(next) = node.sweep_status(now) {
                                        if let Err(e) = nodes.set_status(node.id, next.as_str()).await {
                                            warn!(error = %e, node = %node.node_id, "node sweep update failed");
                                        }
                                    }
                                }
                            }
                            Err(e) => error!(error = %e, "node sweep query failed"),
                        }
                    }
                });
            }
        }
    }

    fn spawn_job<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    _ = shutdown.changed() => {
                        info!(job = name, "scheduler job stopping");
                        break;
                    }
                }
            }
        });
    }
}
