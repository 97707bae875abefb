//! Scalar conversions applied to captured fields before they are stored.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::ParserError;

/// Parses an ISO-8601 instant. A trailing `Z` is read as UTC; values without
/// any offset are taken to be UTC as well.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParserError> {
    static NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    let trimmed = value.trim();

    let rfc3339_err = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => return Ok(dt.with_timezone(&Utc)),
        Err(err) => err,
    };

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.and_utc());
        }
    }

    Err(ParserError::InvalidTimestamp {
        value: trimmed.to_string(),
        reason: rfc3339_err.to_string(),
    })
}

/// Derives the record id: microseconds since the Unix epoch.
pub fn timestamp_to_id(value: &str) -> Result<i64, ParserError> {
    parse_timestamp(value).map(|dt| dt.timestamp_micros())
}

/// Best-effort integer parse; anything unparseable becomes `0`.
pub fn to_int(value: Option<&str>) -> i64 {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
}

/// Trims whitespace and removes one layer of surrounding double quotes.
pub fn to_str(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.to_string()
}
