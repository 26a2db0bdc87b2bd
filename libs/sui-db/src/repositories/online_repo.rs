use crate::error::DbError;
use crate::models::ClientOnline;
use sqlx::PgPool;

/// Master-side presence table. Workers replace their entire slice on every
/// push (section 4.6); the master ages out stale rows on read.
#[derive(Clone, Debug)]
pub struct OnlineRepository {
    pool: PgPool,
}

impl OnlineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn replace_for_node(
        &self,
        node_id: &str,
        rows: &[(String, String, String, chrono::DateTime<chrono::Utc>)],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM client_onlines WHERE node_id = $1")
            .bind(node_id)
            .execute(&mut *tx)
            .await?;

        for (client_name, inbound_tag, source_ip, connected_at) in rows {
            sqlx::query(
                r#"
                INSERT INTO client_onlines
                    (client_name, node_id, inbound_tag, source_ip, connected_at, last_seen)
                VALUES ($1, $2, $3, $4, $5, now())
                "#,
            )
            .bind(client_name)
            .bind(node_id)
            .bind(inbound_tag)
            .bind(source_ip)
            .bind(connected_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn online_users(&self) -> Result<Vec<ClientOnline>, DbError> {
        sqlx::query_as::<_, ClientOnline>(
            "SELECT * FROM client_onlines WHERE last_seen >= now() - interval '60 seconds'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
    }
}
