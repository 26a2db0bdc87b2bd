use crate::error::DbError;
use crate::models::Client;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Client, DbError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Client, DbError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE uuid = $1")
            .bind(uuid)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
    }

    /// Subscription lookup (C11): uuid first, then name, preserving backward
    /// compatibility with older share links that only carried the name.
    pub async fn find_by_uuid_or_name(&self, key: &str) -> Result<Option<Client>, DbError> {
        if let Some(c) =
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE uuid = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?
        {
            return Ok(Some(c));
        }
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE name = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn list(&self) -> Result<Vec<Client>, DbError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn name_taken(&self, name: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE name = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn uuid_taken(&self, uuid: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE uuid = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(uuid)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn insert(&self, c: &Client) -> Result<Client, DbError> {
        sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients
                (uuid, name, enable, volume, expiry, up, down, time_used, time_limit,
                 speed_limit, device_limit, traffic_reset_strategy, time_reset_strategy,
                 traffic_reset_at, time_reset_at, inbounds, config, links)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
            RETURNING *
            "#,
        )
        .bind(&c.uuid)
        .bind(&c.name)
        .bind(c.enable)
        .bind(c.volume)
        .bind(c.expiry)
        .bind(c.up)
        .bind(c.down)
        .bind(c.time_used)
        .bind(c.time_limit)
        .bind(c.speed_limit)
        .bind(c.device_limit)
        .bind(&c.traffic_reset_strategy)
        .bind(&c.time_reset_strategy)
        .bind(c.traffic_reset_at)
        .bind(c.time_reset_at)
        .bind(&c.inbounds)
        .bind(&c.config)
        .bind(&c.links)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn update(&self, c: &Client) -> Result<Client, DbError> {
        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                uuid = $1, name = $2, enable = $3, volume = $4, expiry = $5,
                up = $6, down = $7, time_used = $8, time_limit = $9, speed_limit = $10,
                device_limit = $11, traffic_reset_strategy = $12, time_reset_strategy = $13,
                traffic_reset_at = $14, time_reset_at = $15, inbounds = $16, config = $17,
                links = $18
            WHERE id = $19
            RETURNING *
            "#,
        )
        .bind(&c.uuid)
        .bind(&c.name)
        .bind(c.enable)
        .bind(c.volume)
        .bind(c.expiry)
        .bind(c.up)
        .bind(c.down)
        .bind(c.time_used)
        .bind(c.time_limit)
        .bind(c.speed_limit)
        .bind(c.device_limit)
        .bind(&c.traffic_reset_strategy)
        .bind(&c.time_reset_strategy)
        .bind(c.traffic_reset_at)
        .bind(c.time_reset_at)
        .bind(&c.inbounds)
        .bind(&c.config)
        .bind(&c.links)
        .bind(c.id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_enable(&self, id: i64, enable: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE clients SET enable = $1 WHERE id = $2")
            .bind(enable)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Adds traffic to a client keyed by name, returning the updated row if one matched.
    /// Used by both `drainStats` (C4) and master-side stats ingest (C6), which share
    /// the same user-counter update semantics.
    pub async fn add_traffic_by_name(
        &self,
        name: &str,
        up: i64,
        down: i64,
    ) -> Result<Option<Client>, DbError> {
        sqlx::query_as::<_, Client>(
            "UPDATE clients SET up = up + $1, down = down + $2 WHERE name = $3 RETURNING *",
        )
        .bind(up)
        .bind(down)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn add_time_used(&self, name: &str, seconds: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE clients SET time_used = time_used + $1 WHERE name = $2")
            .bind(seconds)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clients exceeding any quota while still enabled (section 4.4).
    pub async fn find_exhausted(&self, now: i64) -> Result<Vec<Client>, DbError> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE enable = TRUE AND (
                (volume > 0 AND up + down > volume)
                OR (expiry > 0 AND expiry < $1)
                OR (time_limit > 0 AND time_used >= time_limit)
            )
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn find_due_for_traffic_reset(&self, now: i64) -> Result<Vec<Client>, DbError> {
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE traffic_reset_strategy <> 'no_reset' AND traffic_reset_at <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn find_due_for_time_reset(&self, now: i64) -> Result<Vec<Client>, DbError> {
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE time_reset_strategy <> 'no_reset' AND time_reset_at <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn reset_traffic(&self, id: i64, next_reset_at: i64) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE clients SET up = 0, down = 0, enable = TRUE, traffic_reset_at = $1 WHERE id = $2",
        )
        .bind(next_reset_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn reset_time(&self, id: i64, next_reset_at: i64) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE clients SET time_used = 0, enable = TRUE, time_reset_at = $1 WHERE id = $2",
        )
        .bind(next_reset_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_links(&self, id: i64, links: &serde_json::Value) -> Result<(), DbError> {
        sqlx::query("UPDATE clients SET links = $1 WHERE id = $2")
            .bind(links)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces the whole table in one shot — used by the worker's config-apply
    /// transaction (C7), which deletes-all then bulk-inserts per table.
    pub async fn replace_all(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        clients: &[Client],
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM clients").execute(&mut **tx).await?;
        for c in clients {
            sqlx::query(
                r#"
                INSERT INTO clients
                    (id, uuid, name, enable, volume, expiry, up, down, time_used, time_limit,
                     speed_limit, device_limit, traffic_reset_strategy, time_reset_strategy,
                     traffic_reset_at, time_reset_at, inbounds, config, links)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
                "#,
            )
            .bind(c.id)
            .bind(&c.uuid)
            .bind(&c.name)
            .bind(c.enable)
            .bind(c.volume)
            .bind(c.expiry)
            .bind(c.up)
            .bind(c.down)
            .bind(c.time_used)
            .bind(c.time_limit)
            .bind(c.speed_limit)
            .bind(c.device_limit)
            .bind(&c.traffic_reset_strategy)
            .bind(&c.time_reset_strategy)
            .bind(c.traffic_reset_at)
            .bind(c.time_reset_at)
            .bind(&c.inbounds)
            .bind(&c.config)
            .bind(&c.links)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
