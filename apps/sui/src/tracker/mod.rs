pub mod connection_tracker;
pub mod stats_tracker;
pub mod time_tracker;

pub use connection_tracker::{ConnectionKind, ConnectionTracker, RoutedConnection};
pub use stats_tracker::{DrainedStat, StatsTracker};
pub use time_tracker::TimeTracker;
