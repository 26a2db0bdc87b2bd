use crate::error::DbError;
use crate::models::{Node, NodeToken};
use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct NodeRepository {
    pool: PgPool,
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

impl NodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mints a single-use registration invitation (section 4.6).
    pub async fn mint_token(
        &self,
        name: Option<&str>,
        expires_at: i64,
    ) -> Result<NodeToken, DbError> {
        let token = random_token();
        sqlx::query_as::<_, NodeToken>(
            r#"
            INSERT INTO node_tokens (token, name, expires_at, used, used_by)
            VALUES ($1, $2, $3, FALSE, NULL)
            RETURNING *
            "#,
        )
        .bind(&token)
        .bind(name)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn find_token(&self, token: &str) -> Result<Option<NodeToken>, DbError> {
        sqlx::query_as::<_, NodeToken>("SELECT * FROM node_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn find_by_node_id(&self, node_id: &str) -> Result<Option<Node>, DbError> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE node_id = $1")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)
    }

    /// Registers a worker under one transaction: validate token, reject if the
    /// node id already exists, create the node, mark the token used. Idempotent
    /// on `token` — a replayed registration with an already-used token fails.
    pub async fn register(
        &self,
        token: &str,
        node_id: &str,
        name: &str,
        address: Option<&str>,
        external_host: Option<&str>,
        external_port: Option<i32>,
        version: &str,
    ) -> Result<Node, DbError> {
        let mut tx = self.pool.begin().await?;

        let invite = sqlx::query_as::<_, NodeToken>(
            "SELECT * FROM node_tokens WHERE token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::Auth("unknown registration token".to_string()))?;

        invite
            .validate(Utc::now().timestamp())
            .map_err(|e| DbError::Auth(e.to_string()))?;

        let existing = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM nodes WHERE node_id = $1)",
        )
        .bind(node_id)
        .fetch_one(&mut *tx)
        .await?;
        if existing {
            return Err(DbError::Conflict(format!(
                "node_id {node_id} already registered"
            )));
        }

        let node_token = random_token();
        let node = sqlx::query_as::<_, Node>(
            r#"
            INSERT INTO nodes
                (node_id, name, address, external_host, external_port, token,
                 enable, status, last_seen, version)
            VALUES ($1,$2,$3,$4,$5,$6, TRUE, 'online', now(), $7)
            RETURNING *
            "#,
        )
        .bind(node_id)
        .bind(name)
        .bind(address)
        .bind(external_host)
        .bind(external_port)
        .bind(&node_token)
        .bind(version)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE node_tokens SET used = TRUE, used_by = $1 WHERE token = $2")
            .bind(node_id)
            .bind(token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(node)
    }

    /// Authenticates a worker call: the `(node_id, token)` pair must match an
    /// enabled node.
    pub async fn authenticate(&self, node_id: &str, token: &str) -> Result<Node, DbError> {
        let node = self
            .find_by_node_id(node_id)
            .await?
            .ok_or_else(|| DbError::Auth("unknown node".to_string()))?;

        if node.token != token {
            return Err(DbError::Auth("token mismatch".to_string()));
        }
        if !node.enable {
            return Err(DbError::Auth("node disabled".to_string()));
        }
        Ok(node)
    }

    pub async fn ingest_heartbeat(
        &self,
        node_id: &str,
        version: &str,
        external_host: Option<&str>,
        external_port: Option<i32>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE nodes SET
                status = 'online',
                last_seen = now(),
                version = $1,
                external_host = COALESCE($2, external_host),
                external_port = COALESCE($3, external_port)
            WHERE node_id = $4
            "#,
        )
        .bind(version)
        .bind(external_host)
        .bind(external_port)
        .bind(node_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_synced(&self, node_id: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE nodes SET last_sync = now() WHERE node_id = $1")
            .bind(node_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_enabled(&self) -> Result<Vec<Node>, DbError> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE enable = TRUE ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn list_all(&self) -> Result<Vec<Node>, DbError> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
    }

    pub async fn set_status(&self, id: i64, status: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE nodes SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
