use crate::error::DbError;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

const CONFIG_VERSION_KEY: &str = "_config_version";

/// Key/value settings blob plus the process-wide config-version counter
/// (design note: a single monotonic cell, atomic write, relaxed read).
#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
    cache: Arc<RwLock<HashMap<String, String>>>,
    version: Arc<AtomicI64>,
}

impl SettingsRepository {
    pub async fn new(pool: PgPool) -> Result<Self> {
        let repo = Self {
            pool,
            cache: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(AtomicI64::new(0)),
        };
        repo.reload_cache().await?;
        Ok(repo)
    }

    pub async fn reload_cache(&self) -> Result<()> {
        info!("Reloading settings cache from database");
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch settings from DB")?;

        let mut cache = self.cache.write().await;
        cache.clear();
        for (key, value) in rows {
            if key == CONFIG_VERSION_KEY {
                self.version
                    .store(value.parse().unwrap_or(0), Ordering::Relaxed);
            }
            cache.insert(key, value);
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.cache.read().await.get(key).cloned()
    }

    pub async fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get(key).await.unwrap_or_else(|| default.to_string())
    }

    /// Full settings cache, excluding the internal config-version counter
    /// (that travels separately as `ConfigSnapshot::version`). Used to
    /// populate the settings blob served by `/node/config`.
    pub async fn all(&self) -> HashMap<String, String> {
        self.cache
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.as_str() != CONFIG_VERSION_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        self.cache
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Current config-version; relaxed is sufficient since every writer
    /// serializes through [`bump_version`] and readers only need "has it
    /// changed", never a happens-before relationship with other state.
    pub fn config_version(&self) -> i64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Bumps the config-version and persists it. Every C8 mutation and every
    /// C4 job that changes state calls this so workers observe the new value
    /// on their next poll. Monotonic by construction: always +1 from the last
    /// persisted value, never derived from wall-clock time.
    pub async fn bump_version(&self) -> Result<i64, DbError> {
        let next = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        self.set(CONFIG_VERSION_KEY, &next.to_string()).await?;
        Ok(next)
    }
}
