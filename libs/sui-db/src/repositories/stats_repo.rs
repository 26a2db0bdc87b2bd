use crate::error::DbError;
use crate::models::StatsRecord;
use chrono::Utc;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        resource: &str,
        tag: &str,
        direction: &str,
        traffic: i64,
        node_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO stats_records (date_time, resource, tag, direction, traffic, node_id)
             VALUES (now(), $1, $2, $3, $4, $5)",
        )
        .bind(resource)
        .bind(tag)
        .bind(direction)
        .bind(traffic)
        .bind(node_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_batch(
        &self,
        rows: &[(chrono::DateTime<Utc>, String, String, String, i64, String)],
    ) -> Result<(), DbError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (date_time, resource, tag, direction, traffic, node_id) in rows {
            sqlx::query(
                "INSERT INTO stats_records (date_time, resource, tag, direction, traffic, node_id)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(date_time)
            .bind(resource)
            .bind(tag)
            .bind(direction)
            .bind(traffic)
            .bind(node_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn newer_than_for_node(
        &self,
        node_id: &str,
        since: chrono::DateTime<Utc>,
    ) -> Result<Vec<StatsRecord>, DbError> {
        sqlx::query_as::<_, StatsRecord>(
            "SELECT * FROM stats_records WHERE node_id = $1 AND date_time >= $2 ORDER BY date_time",
        )
        .bind(node_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn delete_for_node_before(
        &self,
        node_id: &str,
        before: chrono::DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM stats_records WHERE node_id = $1 AND date_time < $2")
            .bind(node_id)
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes exactly the rows up to and including `through` — the bound a
    /// caller captured from the read it is now reporting as delivered, not a
    /// timestamp taken after the fact, so rows inserted concurrently with the
    /// push are never swept up.
    pub async fn delete_for_node_through(
        &self,
        node_id: &str,
        through: chrono::DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM stats_records WHERE node_id = $1 AND date_time <= $2")
            .bind(node_id)
            .bind(through)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `deleteOldStats` (daily): ages out rows older than `days * 86400` seconds.
    pub async fn delete_older_than_days(&self, days: i64) -> Result<u64, DbError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let result = sqlx::query("DELETE FROM stats_records WHERE date_time < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
