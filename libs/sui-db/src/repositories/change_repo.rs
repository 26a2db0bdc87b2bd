use crate::error::DbError;
use crate::models::Change;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct ChangeRepository {
    pool: PgPool,
}

impl ChangeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        actor: &str,
        key: &str,
        action: &str,
        obj: &serde_json::Value,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO changes (date_time, actor, key, action, obj) VALUES (now(), $1, $2, $3, $4)",
        )
        .bind(actor)
        .bind(key)
        .bind(action)
        .bind(obj)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Change>, DbError> {
        sqlx::query_as::<_, Change>(
            "SELECT * FROM changes ORDER BY date_time DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
    }
}
