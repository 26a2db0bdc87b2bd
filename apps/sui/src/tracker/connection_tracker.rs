use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Stream,
    Packet,
}

#[derive(Debug, Clone)]
struct ConnectionEntry {
    user: String,
    source_ip: String,
    inbound: String,
    connected_at: DateTime<Utc>,
    kind: ConnectionKind,
}

/// Snapshot row handed to C7's presence push. Value-copied, never aliases the
/// live map.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub user: String,
    pub source_ip: String,
    pub inbound: String,
    pub connected_at: DateTime<Utc>,
}

/// Per-node live-connection registry (section 4.1). One mutex guards the whole
/// map; every operation is O(#connections) and never suspends.
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<Mutex<HashMap<u64, ConnectionEntry>>>,
    next_id: Arc<AtomicU64>,
}

/// Returned by `on_routed`. Dropping it (or calling `close` explicitly) removes
/// the tracker entry, mirroring the data-plane's close-callback contract.
pub struct RoutedConnection {
    tracker: ConnectionTracker,
    id: u64,
}

impl RoutedConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn close(self) {
        drop(self)
    }
}

impl Drop for RoutedConnection {
    fn drop(&mut self) {
        self.tracker.inner.lock().unwrap().remove(&self.id);
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly-routed connection and returns the guard the
    /// data-plane wrapper owns for the connection's lifetime.
    pub fn on_routed(
        &self,
        user: &str,
        source_ip: &str,
        inbound: &str,
        kind: ConnectionKind,
    ) -> RoutedConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().unwrap().insert(
            id,
            ConnectionEntry {
                user: user.to_string(),
                source_ip: source_ip.to_string(),
                inbound: inbound.to_string(),
                connected_at: Utc::now(),
                kind,
            },
        );
        RoutedConnection {
            tracker: self.clone(),
            id,
        }
    }

    pub fn online_users(&self) -> Vec<String> {
        let map = self.inner.lock().unwrap();
        let mut users: HashSet<&str> = HashSet::new();
        for e in map.values() {
            users.insert(&e.user);
        }
        users.into_iter().map(str::to_string).collect()
    }

    pub fn user_connection_count(&self, user: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user == user)
            .count()
    }

    pub fn unique_device_count(&self, user: &str) -> usize {
        let map = self.inner.lock().unwrap();
        map.values()
            .filter(|e| e.user == user)
            .map(|e| e.source_ip.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// `limit <= 0` means unlimited.
    pub fn check_device_limit(&self, user: &str, limit: i64) -> bool {
        if limit <= 0 {
            return true;
        }
        (self.unique_device_count(user) as i64) < limit
    }

    /// Closes and removes every connection on `tag`, returning the count closed.
    pub fn close_by_inbound(&self, tag: &str) -> usize {
        let mut map = self.inner.lock().unwrap();
        let ids: Vec<u64> = map
            .iter()
            .filter(|(_, e)| e.inbound == tag)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            map.remove(id);
        }
        ids.len()
    }

    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .map(|e| ConnectionSnapshot {
                user: e.user.clone(),
                source_ip: e.source_ip.clone(),
                inbound: e.inbound.clone(),
                connected_at: e.connected_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_limit_unlimited_when_non_positive() {
        let t = ConnectionTracker::new();
        let _a = t.on_routed("u1", "1.1.1.1", "in1", ConnectionKind::Stream);
        assert!(t.check_device_limit("u1", 0));
        assert!(t.check_device_limit("u1", -1));
    }

    #[test]
    fn device_limit_counts_distinct_source_ips() {
        let t = ConnectionTracker::new();
        let a = t.on_routed("u1", "1.1.1.1", "in1", ConnectionKind::Stream);
        let b = t.on_routed("u1", "1.1.1.2", "in1", ConnectionKind::Stream);
        assert!(!t.check_device_limit("u1", 2)); // 2 distinct == limit, not below it
        let _c = t.on_routed("u1", "1.1.1.3", "in1", ConnectionKind::Stream);
        assert!(!t.check_device_limit("u1", 2));
        drop(a);
        drop(b);
        assert_eq!(t.unique_device_count("u1"), 1);
    }

    #[test]
    fn close_by_inbound_removes_matching_only() {
        let t = ConnectionTracker::new();
        let a = t.on_routed("u1", "1.1.1.1", "in1", ConnectionKind::Stream);
        let _b = t.on_routed("u2", "1.1.1.2", "in2", ConnectionKind::Stream);
        std::mem::forget(a);
        let closed = t.close_by_inbound("in1");
        assert_eq!(closed, 1);
        assert_eq!(t.online_users().len(), 1);
    }

    #[test]
    fn drop_removes_entry() {
        let t = ConnectionTracker::new();
        {
            let _conn = t.on_routed("u1", "1.1.1.1", "in1", ConnectionKind::Stream);
            assert_eq!(t.user_connection_count("u1"), 1);
        }
        assert_eq!(t.user_connection_count("u1"), 0);
    }
}
