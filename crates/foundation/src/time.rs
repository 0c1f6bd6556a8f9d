//! Time primitives: layer time windows and moment-style format strings.
//!
//! Layer descriptors carry their time-field format in moment token syntax
//! (`YYYY-MM-DD HHmm`); these are translated to chrono specifiers here.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time window `[start, end)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// One day starting at `anchor`.
    pub fn one_day(anchor: DateTime<Utc>) -> Self {
        Self::new(anchor, anchor + Duration::days(1))
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    pub fn duration(&self) -> Duration {
        (self.end - self.start).max(Duration::zero())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    InvalidFormat { value: String, format: String },
    UnknownZone(String),
}

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeParseError::InvalidFormat { value, format } => {
                write!(f, "'{value}' does not match time format '{format}'")
            }
            TimeParseError::UnknownZone(value) => write!(f, "ambiguous local time '{value}'"),
        }
    }
}

impl std::error::Error for TimeParseError {}

// Longest tokens first so `YYYY` wins over `YY`, `MMM` over `MM`.
const MOMENT_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DDDD", "%j"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("SSS", "%3f"),
    ("ZZ", "%z"),
    ("Z", "%:z"),
    ("A", "%p"),
    ("a", "%P"),
    ("X", "%s"),
];

/// Translate a moment-style format string into a chrono format string.
///
/// `[...]` escapes literal text, as in moment.
pub fn moment_to_chrono(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;
    'outer: while let Some(c) = rest.chars().next() {
        if c == '[' {
            let body = &rest[1..];
            let end = body.find(']').unwrap_or(body.len());
            push_literal(&mut out, &body[..end]);
            rest = body.get(end + 1..).unwrap_or("");
            continue;
        }
        for (token, spec) in MOMENT_TOKENS {
            if rest.starts_with(token) {
                out.push_str(spec);
                rest = &rest[token.len()..];
                continue 'outer;
            }
        }
        push_literal(&mut out, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn push_literal(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

fn has_zone(chrono_format: &str) -> bool {
    chrono_format.contains("%z") || chrono_format.contains("%:z") || chrono_format.contains("%s")
}

/// Parse `value` with a moment-style `format`; zone-less values are read as UTC.
///
/// Date-only formats resolve to midnight.
pub fn parse_moment(value: &str, format: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let spec = moment_to_chrono(format);
    let invalid = || TimeParseError::InvalidFormat {
        value: value.to_string(),
        format: format.to_string(),
    };

    if has_zone(&spec) {
        if spec == "%s" {
            let secs: i64 = value.trim().parse().map_err(|_| invalid())?;
            return Utc.timestamp_opt(secs, 0).single().ok_or_else(invalid);
        }
        return DateTime::parse_from_str(value, &spec)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid());
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, &spec) {
        return Utc
            .from_local_datetime(&ndt)
            .single()
            .ok_or_else(|| TimeParseError::UnknownZone(value.to_string()));
    }

    let date = NaiveDate::parse_from_str(value, &spec).map_err(|_| invalid())?;
    let ndt = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&ndt))
}

/// Parse an ISO 8601 timestamp, with or without zone; date-only resolves to midnight UTC.
pub fn parse_iso8601(value: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for spec in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(value, spec) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }
    parse_moment(value, "YYYY-MM-DD").map_err(|_| TimeParseError::InvalidFormat {
        value: value.to_string(),
        format: "ISO 8601".to_string(),
    })
}

/// Format `t` using a moment-style format string.
pub fn format_moment(t: DateTime<Utc>, format: &str) -> String {
    t.format(&moment_to_chrono(format)).to_string()
}
