//! Wall-clock readings used to derive ids.

use chrono::Utc;

/// Milliseconds since the Unix epoch (0 if the clock reads before it).
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
