use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sui_db::DbError;

/// Uniform HTTP error surface (section 7). Node-protocol handlers render it as
/// `{success:false,msg}`; the external API renders its own `{code,message}`
/// envelope directly from `DbError` instead of going through this type.
#[derive(Debug)]
pub struct AppError(pub DbError);

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        AppError(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError(DbError::Fatal(sqlx::Error::Io(std::io::Error::other(
            e.to_string(),
        ))))
    }
}

#[derive(Serialize)]
struct NodeErrorBody {
    success: bool,
    msg: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status == StatusCode::INTERNAL_SERVER_ERROR || status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(NodeErrorBody {
                success: false,
                msg: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
