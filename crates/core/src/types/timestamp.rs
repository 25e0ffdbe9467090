use chrono::{DateTime, Utc};

/// Current time as fractional unix seconds, the unit stored in comment rows.
pub fn now_secs() -> f64 {
    to_secs(Utc::now())
}

pub fn to_secs(value: DateTime<Utc>) -> f64 {
    value.timestamp_micros() as f64 / 1_000_000.0
}
