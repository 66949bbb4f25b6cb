//! Resolution — the time-bucket size for historical data.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar/tick granularity for a data series.
///
/// The string form names cache directories on disk, so the mapping must stay
/// stable: `"tick"`, `"1 sec"`, `"30 secs"`, `"1 min"`, `"5 mins"`,
/// `"1 hour"`, `"4 hours"`, `"daily"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// One-second bid/ask quote data.
    Tick,
    Seconds(u32),
    Minutes(u32),
    Hours(u32),
    Daily,
}

impl Resolution {
    /// Cache-directory token for this resolution.
    pub fn token(&self) -> String {
        match self {
            Resolution::Tick => "tick".to_string(),
            Resolution::Seconds(1) => "1 sec".to_string(),
            Resolution::Seconds(n) => format!("{n} secs"),
            Resolution::Minutes(1) => "1 min".to_string(),
            Resolution::Minutes(n) => format!("{n} mins"),
            Resolution::Hours(1) => "1 hour".to_string(),
            Resolution::Hours(n) => format!("{n} hours"),
            Resolution::Daily => "daily".to_string(),
        }
    }

    /// Bucket length in seconds. Tick data has no bucket and reports 0.
    pub fn seconds(&self) -> i64 {
        match self {
            Resolution::Tick => 0,
            Resolution::Seconds(n) => i64::from(*n),
            Resolution::Minutes(n) => i64::from(*n) * 60,
            Resolution::Hours(n) => i64::from(*n) * 3600,
            Resolution::Daily => 86_400,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, Resolution::Daily)
    }

    pub fn is_tick(&self) -> bool {
        matches!(self, Resolution::Tick)
    }

    /// Converts a step duration to the equivalent resolution, normalizing to
    /// the coarsest unit that divides it evenly. Durations that are negative
    /// or not whole seconds have no resolution.
    pub fn from_duration(duration: Duration) -> Option<Resolution> {
        let secs = duration.num_seconds();
        if secs < 0 || Duration::seconds(secs) != duration {
            return None;
        }
        let res = match secs {
            0 => Resolution::Tick,
            86_400 => Resolution::Daily,
            s if s % 3600 == 0 && s < 86_400 => Resolution::Hours((s / 3600) as u32),
            s if s % 60 == 0 && s < 86_400 => Resolution::Minutes((s / 60) as u32),
            s if s < 86_400 => Resolution::Seconds(s as u32),
            _ => return None,
        };
        Some(res)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
