//! DateStyle-sensitive temporal parsing and formatting.
//!
//! Only the `"ISO,<order>"` DateStyle is supported. Other styles are
//! reported with a non-fatal warning and the caller passes the value
//! through as text. Fractional-hour timezone offsets are a documented
//! limitation: only whole hours are representable.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::protocol::types::{Oid, oid};

/// Placeholder date that TIME-only values compose against, so a full
/// timestamp can always be built. Only the time of day is meaningful.
const PLACEHOLDER_DATE: (i32, u32, u32) = (1970, 1, 1);

/// A temporal value decoded from wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgTimestamp {
    /// Calendar date and time of day, without offset
    pub datetime: NaiveDateTime,
    /// Whole-hour UTC offset for TIMESTAMPTZ values; `None` is UTC-naive
    pub offset_hours: Option<i32>,
}

fn all_digits(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_digit)
}

fn digits_to_u32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

/// Match a leading `YYYY-MM-DD` pattern.
fn scan_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    if b.len() < 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    if !(all_digits(&b[0..4]) && all_digits(&b[5..7]) && all_digits(&b[8..10])) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        digits_to_u32(&b[0..4]) as i32,
        digits_to_u32(&b[5..7]),
        digits_to_u32(&b[8..10]),
    )
}

/// Match the last `HH:MM:SS` pattern anywhere in the value.
fn scan_time(s: &str) -> Option<NaiveTime> {
    let b = s.as_bytes();
    if b.len() < 8 {
        return None;
    }
    for i in (0..=b.len() - 8).rev() {
        let w = &b[i..i + 8];
        if w[2] == b':'
            && w[5] == b':'
            && all_digits(&w[0..2])
            && all_digits(&w[3..5])
            && all_digits(&w[6..8])
        {
            if let Some(time) = NaiveTime::from_hms_opt(
                digits_to_u32(&w[0..2]),
                digits_to_u32(&w[3..5]),
                digits_to_u32(&w[6..8]),
            ) {
                return Some(time);
            }
        }
    }
    None
}

/// Match a trailing `:SS-HH` offset. Only negative whole-hour offsets
/// appear in this form; anything else yields no offset (UTC-naive).
fn scan_tz(s: &str) -> Option<i32> {
    let b = s.as_bytes();
    if b.len() < 6 {
        return None;
    }
    let tail = &b[b.len() - 6..];
    if tail[0] == b':' && tail[3] == b'-' && all_digits(&tail[1..3]) && all_digits(&tail[4..6]) {
        Some(-(digits_to_u32(&tail[4..6]) as i32))
    } else {
        None
    }
}

/// Parse a temporal wire text value according to the server's DateStyle.
///
/// Returns `None` when the style is not `"ISO,<order>"` or the OID is not a
/// temporal type; the caller then passes the value through as text.
pub fn parse_date_from_postgres(value: &str, datestyle: &str, type_oid: Oid) -> Option<PgTimestamp> {
    let style = datestyle.split(',').next().unwrap_or("").trim();
    if style != "ISO" {
        tracing::warn!(datestyle, "DateStyle not implemented, passing value through");
        return None;
    }

    let wants_date = matches!(type_oid, oid::DATE | oid::TIMESTAMP | oid::TIMESTAMPTZ);
    let wants_time = matches!(type_oid, oid::TIME | oid::TIMESTAMP | oid::TIMESTAMPTZ);
    if !wants_date && !wants_time {
        return None;
    }

    let offset_hours = if type_oid == oid::TIMESTAMPTZ {
        scan_tz(value)
    } else {
        None
    };
    let date = if wants_date { scan_date(value) } else { None };
    let time = if wants_time { scan_time(value) } else { None };

    let (year, month, day) = PLACEHOLDER_DATE;
    let date = date.or_else(|| NaiveDate::from_ymd_opt(year, month, day))?;
    let time = time.unwrap_or(NaiveTime::MIN);

    Some(PgTimestamp {
        datetime: NaiveDateTime::new(date, time),
        offset_hours,
    })
}

/// Format a temporal value for outbound binding: `YYYYMMDD[ HH:MM:SS][ -tzhours]`.
///
/// TIMESTAMPTZ uses the local UTC offset truncated to whole hours;
/// fractional-hour zones are unrepresentable.
pub fn format_date_for_postgres(ts: &PgTimestamp, type_oid: Oid) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);

    if matches!(type_oid, oid::DATE | oid::TIMESTAMP | oid::TIMESTAMPTZ) {
        parts.push(ts.datetime.format("%Y%m%d").to_string());
    }
    if matches!(type_oid, oid::TIME | oid::TIMESTAMP | oid::TIMESTAMPTZ) {
        parts.push(ts.datetime.format("%H:%M:%S").to_string());
    }
    if type_oid == oid::TIMESTAMPTZ {
        let hours = Local::now().offset().local_minus_utc() / 3600;
        parts.push(hours.to_string());
    }

    parts.join(" ")
}
