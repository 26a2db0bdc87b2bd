use crate::error::DbError;
use crate::models::{CatalogEntry, CatalogKind};
use sqlx::PgPool;

/// Inbound / outbound / tls / services / endpoints all share the same shape —
/// an opaque JSON body keyed by id and a tag unique within the kind — so one
/// repository parameterized on table name serves all five.
#[derive(Clone, Debug)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, DbError> {
        let sql = format!("SELECT id, tag, body FROM {} ORDER BY id", kind.table());
        sqlx::query_as::<_, CatalogEntry>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn get(&self, kind: CatalogKind, id: i64) -> Result<CatalogEntry, DbError> {
        let sql = format!("SELECT id, tag, body FROM {} WHERE id = $1", kind.table());
        sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn tag_taken(
        &self,
        kind: CatalogKind,
        tag: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, DbError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE tag = $1 AND id IS DISTINCT FROM $2)",
            kind.table()
        );
        let taken: bool = sqlx::query_scalar(&sql)
            .bind(tag)
            .bind(exclude_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(taken)
    }

    pub async fn insert(
        &self,
        kind: CatalogKind,
        tag: &str,
        body: &serde_json::Value,
    ) -> Result<CatalogEntry, DbError> {
        let sql = format!(
            "INSERT INTO {} (tag, body) VALUES ($1, $2) RETURNING id, tag, body",
            kind.table()
        );
        sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(tag)
            .bind(body)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn update(
        &self,
        kind: CatalogKind,
        id: i64,
        tag: &str,
        body: &serde_json::Value,
    ) -> Result<CatalogEntry, DbError> {
        let sql = format!(
            "UPDATE {} SET tag = $1, body = $2 WHERE id = $3 RETURNING id, tag, body",
            kind.table()
        );
        sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(tag)
            .bind(body)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn delete(&self, kind: CatalogKind, id: i64) -> Result<(), DbError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn replace_all(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        kind: CatalogKind,
        entries: &[CatalogEntry],
    ) -> Result<(), DbError> {
        let table = kind.table();
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut **tx)
            .await?;
        for e in entries {
            sqlx::query(&format!(
                "INSERT INTO {table} (id, tag, body) VALUES ($1, $2, $3)"
            ))
            .bind(e.id)
            .bind(&e.tag)
            .bind(&e.body)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
