//! Normalization of user-supplied event dates and times.

use once_cell::sync::Lazy;
use regex::Regex;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    UtcOffset,
};

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2}):(\d{2})(?::\d{2})?\s*([AaPp][Mm])?(?:\D|$)")
        .expect("time pattern is valid")
});

/// Normalize a date to `YYYY-MM-DD`.
///
/// Accepts a plain calendar date or an RFC 3339 timestamp; timestamps are
/// converted to their UTC calendar date.
pub fn normalize_date(input: &str) -> Option<String> {
    let input = input.trim();

    let format = format_description!("[year]-[month]-[day]");

    let date = Date::parse(input, format).ok().or_else(|| {
        OffsetDateTime::parse(input, &Rfc3339)
            .ok()
            .map(|ts| ts.to_offset(UtcOffset::UTC).date())
    })?;

    date.format(format).ok()
}

/// Normalize a time of day to zero-padded 24-hour `HH:mm`.
///
/// The first standalone `H:mm` occurrence in the input is used, so `"9:30"`,
/// `"09:30:00"` and `"Doors at 9:30 AM"` all yield `"09:30"`. Digits running
/// into the hour or minutes (`"112:30"`, `"9:305"`) do not count. A trailing
/// AM/PM marker shifts the hour accordingly.
pub fn normalize_time(input: &str) -> Option<String> {
    let caps = TIME_PATTERN.captures(input)?;
    let mut hours: u8 = caps[1].parse().ok()?;
    let minutes: u8 = caps[2].parse().ok()?;

    if let Some(meridiem) = caps.get(3) {
        if !(1..=12).contains(&hours) {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hours = match (hours, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    if hours > 23 || minutes > 59 {
        return None;
    }

    Some(format!("{hours:02}:{minutes:02}"))
}
