use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The six mutation targets C8's `save()` entry-point dispatches on. Inbound,
/// outbound, tls, services and endpoints are opaque listener/peer definitions
/// referenced only by id and tag; their body is unconstrained JSON because
/// the proxy engine, not the control plane, defines their schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Inbounds,
    Outbounds,
    Tls,
    Services,
    Endpoints,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Inbounds => "inbounds",
            CatalogKind::Outbounds => "outbounds",
            CatalogKind::Tls => "tls_configs",
            CatalogKind::Services => "services",
            CatalogKind::Endpoints => "endpoints",
        }
    }

    pub fn all() -> [CatalogKind; 5] {
        [
            CatalogKind::Inbounds,
            CatalogKind::Outbounds,
            CatalogKind::Tls,
            CatalogKind::Services,
            CatalogKind::Endpoints,
        ]
    }
}

/// A single catalog row: opaque listener/peer definition identified by id and
/// a tag unique within its kind.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CatalogEntry {
    pub id: i64,
    pub tag: String,
    pub body: serde_json::Value,
}
