use thiserror::Error;

/// Error taxonomy surfaced across the HTTP boundary. `Transient` is the only
/// kind a caller loop (C4, C7) should retry; everything else is either a
/// client mistake or unrecoverable for this request.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Auth(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient error: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("fatal error: {0}")]
    Fatal(#[source] sqlx::Error),
}

impl DbError {
    pub fn http_status(&self) -> u16 {
        match self {
            DbError::Validation(_) => 400,
            DbError::Auth(_) => 401,
            DbError::Conflict(_) => 409,
            DbError::NotFound(_) => 404,
            DbError::Transient(_) => 503,
            DbError::Fatal(_) => 500,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => DbError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Postgres unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    DbError::Conflict(db_err.message().to_string())
                } else {
                    DbError::Transient(e)
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => DbError::Transient(e),
            _ => DbError::Transient(e),
        }
    }
}
