use crate::error::AppError;
use axum::http::HeaderMap;
use sui_db::models::Node;
use sui_db::repositories::NodeRepository;

/// Authenticates a worker→master call against the `X-Node-Id` / `X-Node-Token`
/// header pair (section 4.6). Every node-protocol handler calls this first.
pub async fn authenticate(headers: &HeaderMap, nodes: &NodeRepository) -> Result<Node, AppError> {
    let node_id = header_str(headers, "x-node-id").ok_or_else(|| auth("missing X-Node-Id header"))?;
    let token = header_str(headers, "x-node-token").ok_or_else(|| auth("missing X-Node-Token header"))?;

    nodes.authenticate(node_id, token).await.map_err(AppError)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|s| !s.is_empty())
}

fn auth(msg: &str) -> AppError {
    AppError(sui_db::DbError::Auth(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_str_rejects_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-node-id", "".parse().unwrap());
        assert_eq!(header_str(&headers, "x-node-id"), None);
    }

    #[test]
    fn header_str_is_case_insensitive_by_construction() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Node-Id", "w1".parse().unwrap());
        assert_eq!(header_str(&headers, "x-node-id"), Some("w1"));
    }
}
