use crate::error::AppError;
use crate::link_generator::LinkGenerator;
use crate::protocol_gen;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use sui_db::models::{CatalogEntry, CatalogKind, Client};
use sui_db::repositories::{CatalogRepository, ChangeRepository, ClientRepository, SettingsRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Clients,
    Inbounds,
    Outbounds,
    Tls,
    Services,
    Endpoints,
    Settings,
}

impl ConfigKey {
    fn catalog_kind(&self) -> Option<CatalogKind> {
        match self {
            ConfigKey::Inbounds => Some(CatalogKind::Inbounds),
            ConfigKey::Outbounds => Some(CatalogKind::Outbounds),
            ConfigKey::Tls => Some(CatalogKind::Tls),
            ConfigKey::Services => Some(CatalogKind::Services),
            ConfigKey::Endpoints => Some(CatalogKind::Endpoints),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Clients => "clients",
            ConfigKey::Inbounds => "inbounds",
            ConfigKey::Outbounds => "outbounds",
            ConfigKey::Tls => "tls",
            ConfigKey::Services => "services",
            ConfigKey::Endpoints => "endpoints",
            ConfigKey::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    New,
    Edit,
    AddBulk,
    Del,
}

#[derive(Debug, Deserialize)]
pub struct ClientPayload {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enable: bool,
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
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CatalogPayload {
    pub id: Option<i64>,
    pub tag: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Single mutation entry point (section 4.8). Every write to the catalog
/// flows through `save`, which appends an audit record, regenerates affected
/// clients' links, and bumps the config version so workers observe the change
/// on their next poll.
#[derive(Clone)]
pub struct ConfigService {
    clients: ClientRepository,
    catalog: CatalogRepository,
    settings: SettingsRepository,
    changes: ChangeRepository,
    link_generator: Arc<dyn LinkGenerator>,
    read_only: bool,
}

impl ConfigService {
    pub fn new(
        clients: ClientRepository,
        catalog: CatalogRepository,
        settings: SettingsRepository,
        changes: ChangeRepository,
        link_generator: Arc<dyn LinkGenerator>,
        read_only: bool,
    ) -> Self {
        Self {
            clients,
            catalog,
            settings,
            changes,
            link_generator,
            read_only,
        }
    }

    /// `save(key, action, payload, initIds?, actor, hostname)`. Returns the ids
    /// of inbounds that must be restarted by the data-plane. Worker mode
    /// (`read_only`) rejects everything except the initial config-apply path,
    /// which bypasses `save` entirely (see `sync_client::apply_snapshot`).
    pub async fn save(
        &self,
        key: ConfigKey,
        action: ConfigAction,
        payload: serde_json::Value,
        actor: &str,
        hostname: &str,
    ) -> Result<Vec<i64>, AppError> {
        if self.read_only {
            return Err(AppError(sui_db::DbError::Auth(
                "config mutations are disabled on a worker node".to_string(),
            )));
        }

        let affected = match key {
            ConfigKey::Clients => self.save_client(action, payload).await?,
            ConfigKey::Settings => {
                self.save_settings(payload).await?;
                Vec::new()
            }
            _ => {
                let kind = key.catalog_kind().expect("non-client, non-settings key has a catalog kind");
                self.save_catalog(kind, action, payload).await?
            }
        };

        self.changes
            .append(
                actor,
                key.as_str(),
                action_str(action),
                &serde_json::json!({ "hostname": hostname }),
            )
            .await?;
        self.settings.bump_version().await?;

        Ok(affected)
    }

    async fn save_client(&self, action: ConfigAction, payload: serde_json::Value) -> Result<Vec<i64>, AppError> {
        match action {
            ConfigAction::Del => {
                let id: i64 = payload["id"].as_i64().ok_or_else(|| validation("missing id"))?;
                let existing = self.clients.get_by_id(id).await?;
                self.clients.delete(id).await?;
                Ok(existing.inbound_ids())
            }
            ConfigAction::New | ConfigAction::Edit => {
                let p: ClientPayload = serde_json::from_value(payload).map_err(|e| validation(&e.to_string()))?;
                let existing = match p.id {
                    Some(id) => Some(self.clients.get_by_id(id).await?),
                    None => None,
                };

                if self.clients.uuid_taken(&p.uuid, p.id).await? {
                    return Err(AppError(sui_db::DbError::Conflict(format!("uuid {} already in use", p.uuid))));
                }
                if self.clients.name_taken(&p.name, p.id).await? {
                    return Err(AppError(sui_db::DbError::Conflict(format!("name {} already in use", p.name))));
                }

                let identity_touched = existing
                    .as_ref()
                    .map(|e| e.uuid != p.uuid || e.name != p.name || e.enable != p.enable)
                    .unwrap_or(true);
                let config_touched = existing
                    .as_ref()
                    .zip(p.config.as_ref())
                    .map(|(e, c)| &e.config != c)
                    .unwrap_or(p.config.is_some());

                let config = p
                    .config
                    .or_else(|| existing.as_ref().map(|e| e.config.clone()))
                    .unwrap_or_else(|| protocol_gen::generate_client_config(&p.uuid));

                let client = Client {
                    id: existing.as_ref().map(|e| e.id).unwrap_or(0),
                    uuid: p.uuid,
                    name: p.name,
                    enable: p.enable,
                    volume: p.volume,
                    expiry: p.expiry,
                    up: existing.as_ref().map(|e| e.up).unwrap_or(0),
                    down: existing.as_ref().map(|e| e.down).unwrap_or(0),
                    time_used: existing.as_ref().map(|e| e.time_used).unwrap_or(0),
                    time_limit: p.time_limit,
                    speed_limit: p.speed_limit,
                    device_limit: p.device_limit,
                    traffic_reset_strategy: p.traffic_reset_strategy,
                    time_reset_strategy: p.time_reset_strategy,
                    traffic_reset_at: existing.as_ref().map(|e| e.traffic_reset_at).unwrap_or(0),
                    time_reset_at: existing.as_ref().map(|e| e.time_reset_at).unwrap_or(0),
                    inbounds: serde_json::json!(p.inbounds),
                    config,
                    links: existing.as_ref().map(|e| e.links.clone()).unwrap_or_else(|| serde_json::json!([])),
                    created_at: existing.as_ref().map(|e| e.created_at).unwrap_or_else(chrono::Utc::now),
                };

                let saved = if existing.is_some() {
                    self.clients.update(&client).await?
                } else {
                    self.clients.insert(&client).await?
                };

                let affected = affected_inbounds(existing.as_ref(), &saved, identity_touched || config_touched);
                self.regenerate_links(&saved).await?;
                Ok(affected)
            }
            ConfigAction::AddBulk => {
                let items: Vec<serde_json::Value> = serde_json::from_value(payload).map_err(|e| validation(&e.to_string()))?;
                let mut affected = HashSet::new();
                for item in items {
                    for id in Box::pin(self.save_client(ConfigAction::New, item)).await? {
                        affected.insert(id);
                    }
                }
                Ok(affected.into_iter().collect())
            }
        }
    }

    async fn regenerate_links(&self, client: &Client) -> Result<(), AppError> {
        let mut inbounds = Vec::new();
        for kind in CatalogKind::all() {
            inbounds.extend(self.catalog.list(kind).await?);
        }
        let inbounds: Vec<CatalogEntry> = inbounds.into_iter().filter(|i| client.inbound_ids().contains(&i.id)).collect();

        let generated = self.link_generator.generate_local_links(client, &inbounds);
        let preserved: Vec<sui_db::models::ClientLink> = serde_json::from_value(client.links.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|l: &sui_db::models::ClientLink| l.kind != sui_db::models::LinkKind::Local)
            .collect();

        let mut links = generated;
        links.extend(preserved);
        self.clients.set_links(client.id, &serde_json::json!(links)).await?;
        Ok(())
    }

    async fn save_catalog(&self, kind: CatalogKind, action: ConfigAction, payload: serde_json::Value) -> Result<Vec<i64>, AppError> {
        match action {
            ConfigAction::Del => {
                let id: i64 = payload["id"].as_i64().ok_or_else(|| validation("missing id"))?;
                self.catalog.delete(kind, id).await?;
                Ok(vec![id])
            }
            ConfigAction::New | ConfigAction::Edit => {
                let p: CatalogPayload = serde_json::from_value(payload).map_err(|e| validation(&e.to_string()))?;
                if self.catalog.tag_taken(kind, &p.tag, p.id).await? {
                    return Err(AppError(sui_db::DbError::Conflict(format!("tag {} already in use", p.tag))));
                }
                let entry = match p.id {
                    Some(id) => self.catalog.update(kind, id, &p.tag, &p.body).await?,
                    None => self.catalog.insert(kind, &p.tag, &p.body).await?,
                };
                Ok(vec![entry.id])
            }
            ConfigAction::AddBulk => {
                let items: Vec<CatalogPayload> = serde_json::from_value(payload).map_err(|e| validation(&e.to_string()))?;
                let mut ids = Vec::new();
                for item in items {
                    let entry = self.catalog.insert(kind, &item.tag, &item.body).await?;
                    ids.push(entry.id);
                }
                Ok(ids)
            }
        }
    }

    async fn save_settings(&self, payload: serde_json::Value) -> Result<(), AppError> {
        let map: std::collections::HashMap<String, String> =
            serde_json::from_value(payload).map_err(|e| validation(&e.to_string()))?;
        for (k, v) in map {
            self.settings.set(&k, &v).await?;
        }
        Ok(())
    }
}

fn action_str(action: ConfigAction) -> &'static str {
    match action {
        ConfigAction::New => "new",
        ConfigAction::Edit => "edit",
        ConfigAction::AddBulk => "addbulk",
        ConfigAction::Del => "del",
    }
}

fn validation(msg: &str) -> AppError {
    AppError(sui_db::DbError::Validation(msg.to_string()))
}

/// Affected-inbounds rule (section 4.8): identity-field mutations union old
/// and new inbound lists; a plain inbounds-list edit takes the symmetric
/// difference instead, since only the gained/lost inbounds need a restart.
fn affected_inbounds(old: Option<&Client>, new: &Client, identity_touched: bool) -> Vec<i64> {
    let new_ids: HashSet<i64> = new.inbound_ids().into_iter().collect();
    let old_ids: HashSet<i64> = old.map(|c| c.inbound_ids().into_iter().collect()).unwrap_or_default();

    let set: HashSet<i64> = if identity_touched {
        old_ids.union(&new_ids).copied().collect()
    } else {
        old_ids.symmetric_difference(&new_ids).copied().collect()
    };
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(inbounds: Vec<i64>) -> Client {
        Client {
            id: 1,
            uuid: "u".into(),
            name: "n".into(),
            enable: true,
            volume: 0,
            expiry: 0,
            up: 0,
            down: 0,
            time_used: 0,
            time_limit: 0,
            speed_limit: 0,
            device_limit: 0,
            traffic_reset_strategy: "no_reset".into(),
            time_reset_strategy: "no_reset".into(),
            traffic_reset_at: 0,
            time_reset_at: 0,
            inbounds: serde_json::json!(inbounds),
            config: serde_json::json!({}),
            links: serde_json::json!([]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn identity_touch_unions_inbound_lists() {
        let old = client(vec![1, 2]);
        let new = client(vec![2, 3]);
        let mut affected = affected_inbounds(Some(&old), &new, true);
        affected.sort();
        assert_eq!(affected, vec![1, 2, 3]);
    }

    #[test]
    fn plain_inbound_edit_takes_symmetric_difference() {
        let old = client(vec![1, 2]);
        let new = client(vec![2, 3]);
        let mut affected = affected_inbounds(Some(&old), &new, false);
        affected.sort();
        assert_eq!(affected, vec![1, 3]);
    }

    #[test]
    fn new_client_affects_its_whole_inbound_list() {
        let new = client(vec![5, 6]);
        let mut affected = affected_inbounds(None, &new, true);
        affected.sort();
        assert_eq!(affected, vec![5, 6]);
    }
}
