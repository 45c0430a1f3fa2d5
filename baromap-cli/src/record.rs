//! Shape of the `time;pressure` stream the `baro-log` binary emits.

use chrono::{DateTime, TimeZone};
use std::fmt;
use std::time::Duration;

/// Column header, printed once before the first sample.
pub const HEADER: &str = "time;pressure";

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Wall-clock time with a fixed six-digit (microsecond) fraction, so lines
/// sort chronologically as plain text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn format_line<Tz: TimeZone>(timestamp: DateTime<Tz>, pressure_hpa: f32) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("{};{}", timestamp.format(TIMESTAMP_FORMAT), pressure_hpa)
}
