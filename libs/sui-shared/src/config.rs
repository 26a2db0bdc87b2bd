use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Calendar cadence by which a counter is zeroed and the owning client re-enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStrategy {
    NoReset,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ResetStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetStrategy::NoReset => "no_reset",
            ResetStrategy::Daily => "daily",
            ResetStrategy::Weekly => "weekly",
            ResetStrategy::Monthly => "monthly",
            ResetStrategy::Yearly => "yearly",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "daily" => ResetStrategy::Daily,
            "weekly" => ResetStrategy::Weekly,
            "monthly" => ResetStrategy::Monthly,
            "yearly" => ResetStrategy::Yearly,
            _ => ResetStrategy::NoReset,
        }
    }

    /// Adds one unit of this strategy to `from`, returning the epoch seconds of the next reset.
    /// `NoReset` always yields 0, matching the `trafficResetAt == 0 <=> strategy == no_reset` invariant.
    pub fn next_reset_at(&self, from: i64) -> i64 {
        let base = match Utc.timestamp_opt(from.max(Utc::now().timestamp()), 0) {
            chrono::LocalResult::Single(dt) => dt,
            _ => Utc::now(),
        };

        match self {
            ResetStrategy::NoReset => 0,
            ResetStrategy::Daily => (base + chrono::Duration::days(1)).timestamp(),
            ResetStrategy::Weekly => (base + chrono::Duration::weeks(1)).timestamp(),
            ResetStrategy::Monthly => add_months(base, 1).timestamp(),
            ResetStrategy::Yearly => {
                let year = base.year() + 1;
                base.with_year(year).unwrap_or(base).timestamp()
            }
        }
    }
}

fn add_months(dt: chrono::DateTime<Utc>, months: i32) -> chrono::DateTime<Utc> {
    let total = dt.month0() as i32 + months;
    let year = dt.year() + total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    // Clamp the day for months shorter than the source (e.g. Jan 31 + 1mo -> Feb 28).
    let mut day = dt.day();
    loop {
        if let Some(candidate) = Utc
            .with_ymd_and_hms(year, month, day, dt.hour(), dt.minute(), dt.second())
            .single()
        {
            return candidate;
        }
        day -= 1;
        if day == 0 {
            return dt;
        }
    }
}

use chrono::Timelike;

/// Full configuration catalog as served by `GET /node/config`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSnapshot {
    pub version: i64,
    pub clients: Vec<serde_json::Value>,
    pub inbounds: Vec<serde_json::Value>,
    pub outbounds: Vec<serde_json::Value>,
    pub tls: Vec<serde_json::Value>,
    pub services: Vec<serde_json::Value>,
    pub endpoints: Vec<serde_json::Value>,
    pub settings: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reset_never_schedules() {
        assert_eq!(ResetStrategy::NoReset.next_reset_at(0), 0);
    }

    #[test]
    fn daily_advances_roughly_one_day() {
        let now = Utc::now().timestamp();
        let next = ResetStrategy::Daily.next_reset_at(now);
        assert!(next - now >= 86_300 && next - now <= 86_500);
    }

    #[test]
    fn monthly_clamps_short_months() {
        let jan31 = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let next = add_months(jan31, 1);
        assert_eq!(next.month(), 2);
        assert!(next.day() <= 28);
    }
}
