//! Pure field validators shared by both ingestion pipelines.
//!
//! No I/O and no store access; everything here operates on raw scalar
//! strings as they come out of the CSV/XML loaders.

use chrono::{NaiveDate, NaiveDateTime};

/// Datetime formats tried in fixed priority order; first match wins.
/// The two date-only formats parse to midnight.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Normalize a mobile number: keep digits plus a leading `+`, drop
/// everything else. Returns None when fewer than 8 digits remain.
///
/// Note: only the lower bound is enforced here; the 8-15 digit screening
/// bound lives in [`screen_mobile_number`] and applies during the
/// validate stage, before cleaning.
pub fn normalize_mobile_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut cleaned = String::with_capacity(trimmed.len());
    for (i, ch) in trimmed.chars().enumerate() {
        if ch.is_ascii_digit() {
            cleaned.push(ch);
        } else if ch == '+' && i == 0 {
            cleaned.push(ch);
        }
    }

    let digit_count = cleaned.chars().filter(|c| c.is_ascii_digit()).count();
    if digit_count < 8 {
        return None;
    }

    Some(cleaned)
}

/// Screening check used during row validation: 8-15 digits after
/// stripping formatting. Accepts any separator style.
pub fn screen_mobile_number(raw: &str) -> bool {
    let digit_count = raw.trim().chars().filter(|c| c.is_ascii_digit()).count();
    (8..=15).contains(&digit_count)
}

/// Parse a datetime string, trying the fixed format list unless an
/// explicit format is given. Returns None when nothing matches.
pub fn validate_datetime(raw: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(fmt) = format {
        return parse_with_format(trimmed, fmt);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

fn parse_with_format(raw: &str, fmt: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
        return Some(dt);
    }
    // Date-only formats still produce a midnight timestamp
    NaiveDate::parse_from_str(raw, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Validate trimmed string length against inclusive bounds.
pub fn validate_string(value: &str, min_len: usize, max_len: usize) -> bool {
    let len = value.trim().chars().count();
    len >= min_len && len <= max_len
}

/// True when the value coerces to a number strictly greater than zero.
pub fn validate_positive_number(raw: &str) -> bool {
    raw.trim().parse::<f64>().map(|v| v > 0.0).unwrap_or(false)
}

/// True when the value coerces to a number greater than or equal to zero.
pub fn validate_non_negative_number(raw: &str) -> bool {
    raw.trim().parse::<f64>().map(|v| v >= 0.0).unwrap_or(false)
}
