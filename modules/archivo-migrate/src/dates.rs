use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;

use crate::types::{DateSource, Tagged};

/// Spanish month names, including the regional "setiembre".
const MONTHS: [(&str, u32); 13] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

/// `<month> <day>[,] <year>`, e.g. "enero 5, 2013" or "Setiembre 21 2015".
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = MONTHS.map(|(name, _)| name).join("|");
    Regex::new(&format!(
        r"(?i)\b({names})\s+([0-9]{{1,2}})\s*,?\s*([0-9]{{4}})\b"
    ))
    .expect("valid regex")
});

/// First month-name date in `text`, or an empty string.
pub fn extract_date_label(text: &str) -> String {
    DATE_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Noon UTC on January 1st of `year`.
pub fn year_fallback(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Resolve a date label to noon UTC on that day. Anything unusable, including
/// impossible calendar dates, falls back to January 1st of `fallback_year`.
///
/// Noon keeps the calendar day stable when the timestamp is later shown in
/// any local timezone.
pub fn parse_date_label(label: &str, fallback_year: i32) -> Tagged<DateTime<Utc>, DateSource> {
    match parse_label(label) {
        Some(date) => Tagged::new(date, DateSource::Label),
        None => Tagged::new(year_fallback(fallback_year), DateSource::YearFallback),
    }
}

fn parse_label(label: &str) -> Option<DateTime<Utc>> {
    let caps = DATE_RE.captures(label)?;
    let name = caps[1].to_lowercase();
    let month = MONTHS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, month)| *month)?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;

    let noon = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(12, 0, 0)?;
    Some(noon.and_utc())
}
