use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    read: i64,
    write: i64,
}

/// One drained (tag, direction, traffic) row, stamped by the caller.
#[derive(Debug, Clone)]
pub struct DrainedStat {
    pub resource: &'static str,
    pub tag: String,
    pub direction: &'static str,
    pub traffic: i64,
}

/// Three independent counter tables — inbound, outbound, user — each keyed by
/// tag (section 4.2). `drain()` atomically swaps every counter to zero so
/// concurrent I/O completions never race with a read.
#[derive(Default)]
pub struct StatsTracker {
    inbound: Mutex<HashMap<String, Counter>>,
    outbound: Mutex<HashMap<String, Counter>>,
    user: Mutex<HashMap<String, Counter>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inbound(&self, tag: &str, read: i64, write: i64) {
        add(&self.inbound, tag, read, write)
    }

    pub fn add_outbound(&self, tag: &str, read: i64, write: i64) {
        add(&self.outbound, tag, read, write)
    }

    pub fn add_user(&self, user: &str, read: i64, write: i64) {
        add(&self.user, user, read, write)
    }

    /// Swaps every map to empty and returns the nonzero (tag, direction) rows
    /// across all three resources. Called once per tick by the scheduler.
    pub fn drain(&self) -> Vec<DrainedStat> {
        let mut out = Vec::new();
        drain_into(&self.inbound, "inbound", &mut out);
        drain_into(&self.outbound, "outbound", &mut out);
        drain_into(&self.user, "user", &mut out);
        out
    }
}

fn add(table: &Mutex<HashMap<String, Counter>>, tag: &str, read: i64, write: i64) {
    let mut map = table.lock().unwrap();
    let counter = map.entry(tag.to_string()).or_default();
    counter.read += read;
    counter.write += write;
}

fn drain_into(table: &Mutex<HashMap<String, Counter>>, resource: &'static str, out: &mut Vec<DrainedStat>) {
    let drained = std::mem::take(&mut *table.lock().unwrap());
    for (tag, counter) in drained {
        if counter.read != 0 {
            out.push(DrainedStat {
                resource,
                tag: tag.clone(),
                direction: "down",
                traffic: counter.read,
            });
        }
        if counter.write != 0 {
            out.push(DrainedStat {
                resource,
                tag,
                direction: "up",
                traffic: counter.write,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_zeroes_counters() {
        let t = StatsTracker::new();
        t.add_user("alice", 100, 50);
        t.add_user("alice", 10, 5);
        let rows = t.drain();
        let up: i64 = rows.iter().filter(|r| r.direction == "up").map(|r| r.traffic).sum();
        let down: i64 = rows.iter().filter(|r| r.direction == "down").map(|r| r.traffic).sum();
        assert_eq!(up, 55);
        assert_eq!(down, 110);
        assert!(t.drain().is_empty());
    }

    #[test]
    fn zero_rows_are_not_emitted() {
        let t = StatsTracker::new();
        t.add_inbound("in1", 0, 0);
        assert!(t.drain().is_empty());
    }
}
