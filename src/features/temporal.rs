//! Timestamp features
//!
//! Parses ISO-8601 date-times and reduces them to a time-of-day value in
//! `[0, 24)`. Parse failures are surfaced, never defaulted.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{LedgerScanError, Result};

/// Naive (offset-less) date-time layouts accepted after RFC 3339
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Offset-bearing layouts not covered by RFC 3339 (e.g. `+0530`, no seconds)
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%:z"];

/// Stateless timestamp codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalCodec;

impl TemporalCodec {
    /// Encode a timestamp as fractional hour of day (`hour + minute / 60`)
    ///
    /// Seconds are discarded. The wall-clock time is taken as written: an
    /// offset-bearing timestamp is not converted to UTC.
    pub fn encode(&self, timestamp: Option<&str>) -> Result<f64> {
        let dt = parse_timestamp(timestamp)?;
        Ok(dt.hour() as f64 + dt.minute() as f64 / 60.0)
    }

    /// Day of week, Monday = 0 through Sunday = 6
    pub fn day_of_week(&self, timestamp: Option<&str>) -> Result<u32> {
        let dt = parse_timestamp(timestamp)?;
        Ok(dt.weekday().num_days_from_monday())
    }
}

/// Parse an ISO-8601 timestamp into its local wall-clock date-time
pub fn parse_timestamp(timestamp: Option<&str>) -> Result<NaiveDateTime> {
    let raw = timestamp.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(LedgerScanError::InvalidTimestamp(
            timestamp.unwrap_or_default().to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.naive_local());
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| LedgerScanError::InvalidTimestamp(raw.to_string()))
}
