//! Date parsing for DATE-typed input.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Parses raw strings into timestamps.
pub trait DateParser {
    fn parse(&self, raw: &str) -> Option<DateTime<FixedOffset>>;

    /// All-or-nothing: `None` as soon as one value fails.
    fn parse_all(&self, raws: &[String]) -> Option<Vec<DateTime<FixedOffset>>> {
        raws.iter().map(|raw| self.parse(raw)).collect()
    }
}

/// chrono format strings tried in order after RFC 3339.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%a %b %d %Y %H:%M:%S GMT%z",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d",
    "%d.%m.%Y",
];

/// Date parser driven by a list of chrono formats.
///
/// Formats without an offset are read as UTC; date-only formats as midnight UTC.
#[derive(Debug, Clone)]
pub struct FormatDateParser {
    formats: Vec<String>,
}

impl FormatDateParser {
    pub fn new<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { formats: formats.into_iter().map(Into::into).collect() }
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    fn parse_with(raw: &str, format: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().fixed_offset());
        }
        NaiveDate::parse_from_str(raw, format)
            .ok()
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
    }
}

impl Default for FormatDateParser {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMATS.iter().copied())
    }
}

impl DateParser for FormatDateParser {
    fn parse(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        // ECMA strings may carry a trailing "(Zone Name)"
        let raw = match raw.find(" (") {
            Some(idx) if raw.ends_with(')') => &raw[..idx],
            _ => raw,
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt);
        }
        self.formats.iter().find_map(|format| Self::parse_with(raw, format))
    }
}

// ============================================================================
// Strict import timestamps
// ============================================================================

static STRICT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}[-+][0-9]{2}:?[0-9]{2}$")
        .expect("static timestamp pattern")
});

/// Parse the `yyyy-MM-ddTHH:mm:ss.SSS±hh[:]mm` form used by content files.
///
/// Anything else yields `None`.
pub fn parse_strict_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if !STRICT_TIMESTAMP.is_match(raw) {
        return None;
    }
    // offset colon sits at byte 26 when present
    let compact = if raw.len() == 29 {
        format!("{}{}", &raw[..26], &raw[27..])
    } else {
        raw.to_string()
    };
    DateTime::parse_from_str(&compact, "%Y-%m-%dT%H:%M:%S%.f%z").ok()
}
