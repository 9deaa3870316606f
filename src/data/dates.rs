//! Release date parsing.

use chrono::{Datelike, NaiveDate};

/// Parse `text` with the first matching format.
///
/// Formats with a two-digit year (`%y`) are ambiguous across centuries;
/// when `year_hint` is given and differs from the parsed year by a whole
/// number of centuries, the hint's century is used instead.
pub fn parse_date(text: &str, formats: &[String], year_hint: Option<i64>) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    formats.iter().find_map(|format| {
        let date = NaiveDate::parse_from_str(text, format).ok()?;
        if format.contains("%y") {
            Some(resolve_century(date, year_hint))
        } else {
            Some(date)
        }
    })
}

fn resolve_century(date: NaiveDate, year_hint: Option<i64>) -> NaiveDate {
    let Some(hint) = year_hint else {
        return date;
    };
    let diff = hint - i64::from(date.year());
    if diff == 0 || diff % 100 != 0 {
        return date;
    }
    i32::try_from(hint)
        .ok()
        .and_then(|year| date.with_year(year))
        .unwrap_or(date)
}

/// Days since 1970-01-01, the physical value of a Polars `Date`.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}
