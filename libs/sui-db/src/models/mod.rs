pub mod api_key;
pub mod catalog;
pub mod client;
pub mod node;
pub mod stats;

pub use api_key::{ApiKey, WebhookConfig};
pub use catalog::{CatalogEntry, CatalogKind};
pub use client::{Client, ClientLink, LinkKind};
pub use node::{ClientOnline, Node, NodeStatus, NodeToken};
pub use stats::{Change, StatsRecord, StatsResource};
