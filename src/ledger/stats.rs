use chrono::{Days, Duration, NaiveDate};

use crate::utils::time::week_start;

use super::{
    entities::{ActivityRecord, TrackedValue},
    error::LedgerError,
};

/// Number of weeks shown when nothing else is requested.
pub const DEFAULT_STAT_WEEKS: u32 = 4;

/// Ten years of weeks.
pub const MAX_STAT_WEEKS: u32 = 520;

/// Totals of one activity within a Sunday-anchored week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyStats {
    pub week_start: NaiveDate,
    pub total_duration: Duration,
    pub total_count: u64,
}

impl WeeklyStats {
    fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            total_duration: Duration::zero(),
            total_count: 0,
        }
    }

    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Duration::days(7)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.week_start <= day && day < self.week_end()
    }

    pub fn hours(&self) -> f64 {
        self.total_duration.num_seconds() as f64 / 3600.
    }

    /// Label like `Jan 7`.
    pub fn label(&self) -> String {
        self.week_start.format("%b %-d").to_string()
    }
}

/// Sums values of records named `name` for the `weeks` weeks ending with the week of `today`.
/// The result is ordered oldest week first and always has exactly `weeks` entries. Only the
/// value matching a record's mode is counted.
pub fn weekly_stats<'a>(
    records: impl IntoIterator<Item = &'a ActivityRecord>,
    name: &str,
    today: NaiveDate,
    weeks: u32,
) -> Result<Vec<WeeklyStats>, LedgerError> {
    let too_many = || LedgerError::TooManyWeeks {
        weeks,
        max: MAX_STAT_WEEKS,
    };
    if weeks > MAX_STAT_WEEKS {
        return Err(too_many());
    }

    let current = week_start(today);
    let mut stats = Vec::with_capacity(weeks as usize);
    for index in (0..weeks as u64).rev() {
        let start = current
            .checked_sub_days(Days::new(7 * index))
            .ok_or_else(too_many)?;
        stats.push(WeeklyStats::empty(start));
    }

    for record in records.into_iter().filter(|v| &*v.name == name) {
        let Some(week) = stats.iter_mut().find(|week| week.contains(record.day)) else {
            continue;
        };
        match record.value() {
            TrackedValue::Duration(duration) => week.total_duration += duration,
            TrackedValue::Count(count) => week.total_count += count as u64,
        }
    }

    Ok(stats)
}
