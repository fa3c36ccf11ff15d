pub mod courier;
pub mod event;
pub mod order;
pub mod profile;
pub mod stats;

use chrono::Utc;

/// Wall-clock time in epoch milliseconds, the unit every stored timestamp uses.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
