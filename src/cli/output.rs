//! Text rendering of ledger views for the terminal.

use std::{collections::BTreeMap, fmt::Write};

use ansi_term::Style;
use chrono::NaiveDate;

use crate::ledger::{
    entities::{ActivityMode, ActivityRecord},
    stats::WeeklyStats,
};

fn heading(text: &str, styled: bool) -> String {
    if styled {
        Style::new().bold().paint(text).to_string()
    } else {
        text.to_string()
    }
}

pub fn render_today(today: NaiveDate, entries: &[ActivityRecord], styled: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading(&today.format("%A, %B %-d").to_string(), styled));
    if entries.is_empty() {
        let _ = writeln!(out, "No activities yet");
    }
    for entry in entries {
        let _ = write!(out, "{}\t{}\t{}", entry.formatted_value(), entry.mode, entry.name);
        if let Some(since) = entry.active_since {
            let _ = write!(out, "\ttracking since {}", since.format("%H:%M"));
        }
        let _ = writeln!(out);
    }
    out
}

/// Prints the most recent day first.
pub fn render_history(history: &BTreeMap<NaiveDate, Vec<&ActivityRecord>>, styled: bool) -> String {
    let mut out = String::new();
    for (day, records) in history.iter().rev() {
        let _ = writeln!(out, "{}", heading(&day.format("%x").to_string(), styled));
        for record in records {
            let _ = writeln!(out, "  {}\t{}", record.formatted_value(), record.name);
        }
    }
    out
}

pub fn render_stats(name: &str, mode: ActivityMode, stats: &[WeeklyStats], styled: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading(name, styled));
    for week in stats.iter().rev() {
        match mode {
            ActivityMode::Duration => {
                let _ = writeln!(out, "{}\t{:.1} hours", week.label(), week.hours());
            }
            ActivityMode::Count => {
                let _ = writeln!(out, "{}\t{} counts", week.label(), week.total_count);
            }
        }
    }
    out
}
