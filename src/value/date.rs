// Date decoding and encoding strategies.
//
// The flexible table is ordered most-specific first (time zone and
// fractional seconds before plain timestamps, timestamps before bare dates)
// so a prefix match can never truncate a more precise value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::config::{Config, DateDecodingStrategy, DateEncodingStrategy};
use crate::error::{Error, Location, Result};

#[derive(Clone, Copy)]
enum PatternKind {
    /// Carries an explicit UTC offset.
    Zoned,
    /// Naive timestamp, interpreted as UTC.
    Timestamp,
    /// Bare date, midnight UTC.
    DateOnly,
}

/// Ordered flexible patterns. RFC 3339 is tried before this table.
const FLEXIBLE_PATTERNS: &[(&str, PatternKind)] = &[
    ("%Y-%m-%dT%H:%M:%S%.f%z", PatternKind::Zoned),
    ("%Y-%m-%dT%H:%M:%S%z", PatternKind::Zoned),
    ("%Y-%m-%d %H:%M:%S%.f%z", PatternKind::Zoned),
    ("%Y-%m-%d %H:%M:%S %z", PatternKind::Zoned),
    ("%Y-%m-%dT%H:%M:%S%.f", PatternKind::Timestamp),
    ("%Y-%m-%dT%H:%M:%S", PatternKind::Timestamp),
    ("%Y-%m-%d %H:%M:%S%.f", PatternKind::Timestamp),
    ("%Y-%m-%d %H:%M:%S", PatternKind::Timestamp),
    ("%Y-%m-%d %H:%M", PatternKind::Timestamp),
    ("%Y/%m/%d %H:%M:%S", PatternKind::Timestamp),
    ("%m/%d/%Y %H:%M:%S", PatternKind::Timestamp),
    ("%d/%m/%Y %H:%M:%S", PatternKind::Timestamp),
    ("%d.%m.%Y %H:%M:%S", PatternKind::Timestamp),
    ("%Y-%m-%d", PatternKind::DateOnly),
    ("%Y/%m/%d", PatternKind::DateOnly),
    ("%m/%d/%Y", PatternKind::DateOnly),
    ("%d/%m/%Y", PatternKind::DateOnly),
    ("%d.%m.%Y", PatternKind::DateOnly),
    ("%d-%m-%Y", PatternKind::DateOnly),
    ("%Y%m%d", PatternKind::DateOnly),
    ("%B %d, %Y", PatternKind::DateOnly),
    ("%b %d, %Y", PatternKind::DateOnly),
    ("%d %B %Y", PatternKind::DateOnly),
    ("%d %b %Y", PatternKind::DateOnly),
];

/// Decode a timestamp per the configured strategy.
pub fn decode_datetime(raw: &str, config: &Config, location: &Location) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    let parsed = match &config.date_decoding {
        DateDecodingStrategy::Deferred | DateDecodingStrategy::SecondsSinceEpoch => {
            trimmed.parse::<f64>().ok().and_then(from_epoch_seconds)
        }
        DateDecodingStrategy::MillisSinceEpoch => trimmed
            .parse::<f64>()
            .ok()
            .and_then(|ms| from_epoch_seconds(ms / 1000.0)),
        DateDecodingStrategy::Iso8601 => parse_iso8601(trimmed),
        DateDecodingStrategy::Formatted(pattern) => parse_with_pattern(trimmed, pattern),
        DateDecodingStrategy::Custom(f) => f(trimmed),
        DateDecodingStrategy::Flexible => parse_flexible(trimmed),
        DateDecodingStrategy::FlexibleWithHint(hint) => {
            parse_with_pattern(trimmed, hint).or_else(|| parse_flexible(trimmed))
        }
        DateDecodingStrategy::LocaleAware { locale, style } => {
            config.locale_ops.parse_date(trimmed, locale, *style)
        }
    };

    parsed.ok_or_else(|| Error::type_mismatch("date", raw, location.clone()))
}

/// Render a timestamp per the configured strategy.
pub fn encode_datetime(dt: &DateTime<Utc>, config: &Config) -> String {
    match &config.date_encoding {
        DateEncodingStrategy::Deferred => {
            let nanos = dt.timestamp_subsec_nanos();
            if nanos == 0 {
                dt.timestamp().to_string()
            } else {
                format!("{:.3}", dt.timestamp() as f64 + nanos as f64 / 1e9)
            }
        }
        DateEncodingStrategy::SecondsSinceEpoch => dt.timestamp().to_string(),
        DateEncodingStrategy::MillisSinceEpoch => dt.timestamp_millis().to_string(),
        DateEncodingStrategy::Iso8601 => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        DateEncodingStrategy::Formatted(pattern) => dt.format(pattern).to_string(),
    }
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round().abs() as u32;
    DateTime::from_timestamp(whole, nanos)
}

fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Tolerate a missing offset; interpret as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Pattern dispatch: zoned directives parse to an offset-carrying value,
/// otherwise try naive timestamp, then bare date at midnight.
fn parse_with_pattern(raw: &str, pattern: &str) -> Option<DateTime<Utc>> {
    let zoned = pattern.contains("%z") || pattern.contains("%:z") || pattern.contains("%#z");
    if zoned {
        return DateTime::parse_from_str(raw, pattern)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_flexible(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for (pattern, kind) in FLEXIBLE_PATTERNS {
        match kind {
            PatternKind::Zoned => {
                if let Ok(dt) = DateTime::parse_from_str(raw, pattern) {
                    return Some(dt.with_timezone(&Utc));
                }
            }
            PatternKind::Timestamp => {
                if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
                    return Some(dt.and_utc());
                }
            }
            PatternKind::DateOnly => {
                if let Ok(d) = NaiveDate::parse_from_str(raw, pattern) {
                    return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                }
            }
        }
    }

    // Bare epoch values: 13 digits reads as milliseconds, 9-11 as seconds.
    if raw.chars().all(|c| c.is_ascii_digit()) {
        if raw.len() == 13 {
            if let Ok(ms) = raw.parse::<i64>() {
                return DateTime::from_timestamp_millis(ms);
            }
        }
        if (9..=11).contains(&raw.len()) {
            if let Ok(s) = raw.parse::<i64>() {
                return DateTime::from_timestamp(s, 0);
            }
        }
    }
    None
}
