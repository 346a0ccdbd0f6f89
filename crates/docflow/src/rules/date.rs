//! Date parsing for rule actions.
//!
//! Formats are either `strftime` patterns (anything containing `%`) or
//! reference-date layouts written against `Mon Jan 2 15:04:05 MST 2006`,
//! e.g. `2006-01-02` or `02.01.2006`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use super::RuleError;

/// Reference layout tokens, longest first so that `2006` wins over `2`.
const LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("_2", "%e"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("1", "%m"),
    ("2", "%d"),
    ("3", "%I"),
    ("4", "%M"),
    ("5", "%S"),
];

/// Converts a date layout into a `strftime` pattern.
pub fn to_strftime(layout: &str) -> String {
    if layout.contains('%') {
        return layout.to_string();
    }

    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (token, strftime) in LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(strftime);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Parses `value` with the given layout. Date-only layouts yield midnight UTC.
pub fn parse_date(value: &str, layout: &str) -> Result<DateTime<Utc>, RuleError> {
    let pattern = to_strftime(layout);
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_str(value, &pattern) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, &pattern) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, &pattern) {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(RuleError::InvalidDate {
        value: value.to_string(),
        format: layout.to_string(),
    })
}

/// Zero-pads single-digit components of a `separator`-delimited date so that
/// `2020-11-5` becomes `2020-11-05`.
pub fn pad_components(value: &str, separator: &str) -> String {
    if separator.is_empty() {
        return value.to_string();
    }

    value
        .split(separator)
        .map(|part| {
            let part = part.trim();
            if part.len() == 1 && part.chars().all(|c| c.is_ascii_digit()) {
                format!("0{}", part)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}
