use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

/// This is the standard way of converting a date to a string in daytally.
pub fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Truncates a moment to the calendar day it belongs to in its own timezone.
pub fn local_day<Tz: TimeZone>(moment: &DateTime<Tz>) -> NaiveDate {
    moment.date_naive()
}

/// Returns the Sunday starting the week `date` belongs to.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}
