use std::collections::HashMap;
use std::sync::Mutex;

/// Accumulates online-seconds per user between quota-engine drains (section
/// 4.3). `tick` is driven by the scheduler every 10s; `drain_and_reset` is
/// driven by the quota engine's `accrueTime` job.
#[derive(Default)]
pub struct TimeTracker {
    accumulated: Mutex<HashMap<String, i64>>,
}

impl TimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self, online_users: &[String], interval_secs: i64) {
        let mut map = self.accumulated.lock().unwrap();
        for user in online_users {
            *map.entry(user.clone()).or_insert(0) += interval_secs;
        }
    }

    pub fn drain_and_reset(&self) -> HashMap<String, i64> {
        std::mem::take(&mut *self.accumulated.lock().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_accumulates_only_online_users() {
        let t = TimeTracker::new();
        t.tick(&["alice".to_string()], 10);
        t.tick(&["alice".to_string(), "bob".to_string()], 10);
        let drained = t.drain_and_reset();
        assert_eq!(drained.get("alice"), Some(&20));
        assert_eq!(drained.get("bob"), Some(&10));
    }

    #[test]
    fn drain_clears_state() {
        let t = TimeTracker::new();
        t.tick(&["alice".to_string()], 5);
        let _ = t.drain_and_reset();
        assert!(t.drain_and_reset().is_empty());
    }
}
