use crate::tracker::{StatsTracker, TimeTracker};
use crate::webhook::WebhookNotifier;
use chrono::Utc;
use std::collections::HashSet;
use sui_db::repositories::{ChangeRepository, ClientRepository, SettingsRepository, StatsRepository};
use sui_shared::WebhookEvent;

/// The five scheduled operations that own the client quota lifecycle (section
/// 4.4). Each method is one database transaction; the scheduler (C5) is the
/// only caller, gated so a worker never runs these — authority lives on the
/// master.
#[derive(Clone)]
pub struct QuotaEngine {
    clients: ClientRepository,
    stats: StatsRepository,
    changes: ChangeRepository,
    settings: SettingsRepository,
    webhook: WebhookNotifier,
    local_node_id: String,
}

impl QuotaEngine {
    pub fn new(
        clients: ClientRepository,
        stats: StatsRepository,
        changes: ChangeRepository,
        settings: SettingsRepository,
        webhook: WebhookNotifier,
        local_node_id: String,
    ) -> Self {
        Self {
            clients,
            stats,
            changes,
            settings,
            webhook,
            local_node_id,
        }
    }

    /// Applies C2's drained byte counters to the matching clients, optionally
    /// also appending them to the Stats ledger.
    pub async fn drain_stats(&self, tracker: &StatsTracker, enable_traffic_record: bool) -> anyhow::Result<()> {
        for row in tracker.drain() {
            if row.resource != "user" {
                continue;
            }
            let (up, down) = if row.direction == "up" { (row.traffic, 0) } else { (0, row.traffic) };
            self.clients.add_traffic_by_name(&row.tag, up, down).await?;
            if enable_traffic_record {
                self.stats
                    .insert(row.resource, &row.tag, row.direction, row.traffic, &self.local_node_id)
                    .await?;
            }
        }
        Ok(())
    }

    /// Applies C3's accumulated online-seconds to `timeUsed`.
    pub async fn accrue_time(&self, tracker: &TimeTracker) -> anyhow::Result<()> {
        for (user, seconds) in tracker.drain_and_reset() {
            self.clients.add_time_used(&user, seconds).await?;
        }
        Ok(())
    }

    async fn bump_version_if(&self, affected: &[i64]) -> anyhow::Result<()> {
        if !affected.is_empty() {
            self.settings.bump_version().await?;
        }
        Ok(())
    }

    /// Disables every enabled client that has crossed any quota, fires the
    /// matching webhook, and returns the union of their inbound ids so the
    /// caller can restart the data-plane on them.
    pub async fn deplete_exhausted(&self) -> anyhow::Result<Vec<i64>> {
        let now = Utc::now().timestamp();
        let exhausted = self.clients.find_exhausted(now).await?;

        let mut affected = HashSet::new();
        for client in &exhausted {
            let Some(cause) = client.is_exhausted(now) else { continue };
            self.clients.set_enable(client.id, false).await?;
            self.changes
                .append(
                    "quota_engine",
                    "clients",
                    "disable",
                    &serde_json::json!({ "id": client.id, "name": client.name, "cause": cause }),
                )
                .await?;

            let event = match cause {
                "traffic_exceeded" => WebhookEvent::TrafficExceeded,
                "user_expired" => WebhookEvent::UserExpired,
                _ => WebhookEvent::TimeExceeded,
            };
            self.webhook
                .send_event(event, serde_json::json!({ "name": client.name, "uuid": client.uuid }))
                .await;

            affected.extend(client.inbound_ids());
        }
        let affected: Vec<i64> = affected.into_iter().collect();
        self.bump_version_if(&affected).await?;
        Ok(affected)
    }

    /// Two passes — traffic then time — resetting clients whose reset
    /// schedule is due, re-enabling them and advancing their next reset
    /// timestamp. Deplete always runs before reset within one tick (design
    /// note: a client that depletes and is due for reset is re-enabled).
    pub async fn reset_by_strategy(&self) -> anyhow::Result<Vec<i64>> {
        let now = Utc::now().timestamp();
        let mut affected = HashSet::new();

        for client in self.clients.find_due_for_traffic_reset(now).await? {
            let next = client.traffic_reset_strategy().next_reset_at(now);
            self.clients.reset_traffic(client.id, next).await?;
            self.changes
                .append("quota_engine", "clients", "reset_traffic", &serde_json::json!({ "id": client.id }))
                .await?;
            self.webhook
                .send_event(WebhookEvent::TrafficReset, serde_json::json!({ "name": client.name }))
                .await;
            affected.extend(client.inbound_ids());
        }

        for client in self.clients.find_due_for_time_reset(now).await? {
            let next = client.time_reset_strategy().next_reset_at(now);
            self.clients.reset_time(client.id, next).await?;
            self.changes
                .append("quota_engine", "clients", "reset_time", &serde_json::json!({ "id": client.id }))
                .await?;
            self.webhook
                .send_event(WebhookEvent::TimeReset, serde_json::json!({ "name": client.name }))
                .await;
            affected.extend(client.inbound_ids());
        }

        let affected: Vec<i64> = affected.into_iter().collect();
        self.bump_version_if(&affected).await?;
        Ok(affected)
    }

    pub async fn delete_old_stats(&self, days: i64) -> anyhow::Result<u64> {
        Ok(self.stats.delete_older_than_days(days).await?)
    }
}
