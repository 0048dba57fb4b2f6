use chrono::{DateTime, TimeZone, Utc};

/// Converts an epoch-millisecond instant into a ``DateTime<Utc>``, it is a private
/// helper used internally by fleetsched, as such why it lives in the utils module
pub(crate) fn millis_to_date_time(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

/// Converts a ``DateTime<Utc>`` into an epoch-millisecond instant, it is a private
/// helper used internally by fleetsched, as such why it lives in the utils module
pub(crate) fn date_time_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
