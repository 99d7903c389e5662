use chrono::{Days, NaiveDate};

/// Format used for record dates, page URLs, and the on-disk history.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Parse a `YYYY/MM/DD` record date.
pub fn parse_comic_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Format a date as `YYYY/MM/DD`.
pub fn format_comic_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// The `days` most recent dates ending at `today`, newest first.
///
/// Returns `None` when the range would reach before the earliest
/// representable date.
pub fn dates_back_from(today: NaiveDate, days: u32) -> Option<Vec<NaiveDate>> {
    let days = u64::from(days);
    today.checked_sub_days(Days::new(days.saturating_sub(1)))?;
    (0..days)
        .map(|offset| today.checked_sub_days(Days::new(offset)))
        .collect()
}
