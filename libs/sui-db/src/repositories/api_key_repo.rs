use crate::error::DbError;
use crate::models::{ApiKey, WebhookConfig};
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_active(&self, key: &str) -> Result<Option<ApiKey>, DbError> {
        sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE key = $1 AND enable = TRUE")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn create(&self, name: &str, key: &str) -> Result<ApiKey, DbError> {
        sqlx::query_as::<_, ApiKey>(
            "INSERT INTO api_keys (name, key, enable) VALUES ($1, $2, TRUE) RETURNING *",
        )
        .bind(name)
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, DbError> {
        sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn revoke(&self, id: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE api_keys SET enable = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Option<WebhookConfig>, DbError> {
        sqlx::query_as::<_, WebhookConfig>("SELECT * FROM webhook_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn upsert(
        &self,
        enable: bool,
        url: &str,
        secret: Option<&str>,
    ) -> Result<WebhookConfig, DbError> {
        sqlx::query_as::<_, WebhookConfig>(
            r#"
            INSERT INTO webhook_config (id, enable, url, secret) VALUES (1, $1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET enable = $1, url = $2, secret = $3
            RETURNING *
            "#,
        )
        .bind(enable)
        .bind(url)
        .bind(secret)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }
}
