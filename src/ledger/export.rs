//! CSV rendering of the ledger.

use std::fmt::Write;

use crate::utils::time::format_day;

use super::entities::{ActivityMode, ActivityRecord};

pub const CSV_HEADER: &str = "Date,Activity Name,Mode,Duration (hours),Count";

/// Renders records as CSV, oldest day first. Every row, header included, ends with a newline.
pub fn to_csv<'a>(records: impl IntoIterator<Item = &'a ActivityRecord>) -> String {
    let mut rows = records.into_iter().collect::<Vec<_>>();
    rows.sort_by(|a, b| a.day.cmp(&b.day).then_with(|| a.name.cmp(&b.name)));

    let mut csv = String::new();
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for record in rows {
        let (hours, count) = match record.mode {
            ActivityMode::Duration => (
                format!("{:.2}", record.duration.num_seconds() as f64 / 3600.),
                "0".to_string(),
            ),
            ActivityMode::Count => ("0".to_string(), record.count.to_string()),
        };
        // Writing into a String can't fail
        let _ = writeln!(
            csv,
            "{},{},{},{},{}",
            format_day(record.day),
            record.name.replace(',', ";"),
            record.mode,
            hours,
            count
        );
    }

    csv
}
