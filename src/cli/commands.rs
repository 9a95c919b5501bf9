use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime};
use chrono_english::{parse_date_string, Dialect};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    ledger::{
        entities::{ActivityMode, RecordKey, TrackedValue},
        error::{LedgerError, Persistence},
        Ledger,
    },
    rollover::{shutdown::detect_shutdown, DayRollover, ROLLOVER_CHECK_INTERVAL},
    settings::SettingsStore,
    storage::json_storage::JsonFileStorage,
    utils::{
        clock::{Clock, DefaultClock},
        time::local_day,
    },
};

use super::{
    output::{render_history, render_stats, render_today},
    ValueArgs,
};

const RECORDS_DIR: &str = "records";

fn open_ledger(app_dir: &Path) -> Result<Ledger<JsonFileStorage>> {
    let storage = JsonFileStorage::new(app_dir.join(RECORDS_DIR))?;
    let mut ledger = Ledger::new(storage, Box::new(DefaultClock));
    if ledger.load().is_err() {
        warn!("Continuing with an empty ledger");
    }
    Ok(ledger)
}

fn styled() -> bool {
    std::io::stdout().is_terminal()
}

fn report(persistence: &Persistence) {
    if let Persistence::Failed(e) = persistence {
        eprintln!("Change couldn't be saved: {e}");
    }
}

/// Accepts `2024-03-15` or anything chrono-english understands, like `yesterday`.
pub fn parse_day(input: Option<&str>, now: DateTime<Local>, dialect: Dialect) -> Result<NaiveDate> {
    let Some(input) = input else {
        return Ok(local_day(&now));
    };
    if let Ok(day) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        return Ok(day);
    }
    parse_date_string(input, now, dialect)
        .map(|v| local_day(&v))
        .map_err(|e| anyhow!("Failed to parse date {input}: {e}"))
}

/// Turns value flags into a value. Without flags there is nothing to log, the established
/// mode only decides what the user is asked for.
pub fn resolve_value(
    name: &str,
    value: ValueArgs,
    established: Option<ActivityMode>,
) -> Result<TrackedValue> {
    let resolved = match value {
        ValueArgs {
            count: Some(count),
            hours: None,
            minutes: None,
        } => TrackedValue::Count(count),
        ValueArgs {
            count: None,
            hours,
            minutes,
        } if hours.is_some() || minutes.is_some() => TrackedValue::Duration(
            Duration::hours(hours.unwrap_or(0) as i64)
                + Duration::minutes(minutes.unwrap_or(0) as i64),
        ),
        _ => match established {
            Some(ActivityMode::Count) => bail!("{name} is counted, pass --count"),
            Some(ActivityMode::Duration) => bail!("{name} is timed, pass --hours or --minutes"),
            None => bail!("Pass --hours/--minutes for a timed activity or --count for a counted one"),
        },
    };

    if let Some(mode) = established.filter(|mode| *mode != resolved.mode()) {
        warn!("{name} was tracked as {mode}, switching to {}", resolved.mode());
    }
    Ok(resolved)
}

pub fn log(
    app_dir: &Path,
    name: &str,
    value: ValueArgs,
    date: Option<&str>,
    dialect: Dialect,
) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    let day = parse_day(date, DefaultClock.time(), dialect)?;
    let value = resolve_value(name, value, ledger.established_mode(name))?;

    let applied = ledger.log_value(name, day, value)?;
    report(&applied.persistence);
    println!(
        "{}\t{}\t{}",
        applied.record.day,
        applied.record.formatted_value(),
        applied.record.name
    );
    Ok(())
}

pub fn increment(app_dir: &Path, name: &str, date: Option<&str>, dialect: Dialect) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    let day = parse_day(date, DefaultClock.time(), dialect)?;
    let key = RecordKey::new(name.trim(), day);

    let applied = match ledger.increment_count(&key) {
        // Counting on a day without an entry starts it at one.
        Err(LedgerError::UnknownRecord { .. })
            if ledger.established_mode(name) == Some(ActivityMode::Count) =>
        {
            ledger.log_value(name, day, TrackedValue::Count(1))?
        }
        result => result?,
    };
    report(&applied.persistence);
    println!("{}\t{}", applied.record.formatted_value(), applied.record.name);
    Ok(())
}

pub fn extend(
    app_dir: &Path,
    name: &str,
    minutes: u32,
    date: Option<&str>,
    dialect: Dialect,
) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    let day = parse_day(date, DefaultClock.time(), dialect)?;
    let key = RecordKey::new(name.trim(), day);
    let by = Duration::minutes(minutes as i64);

    let applied = match ledger.extend_duration(&key, by) {
        Err(LedgerError::UnknownRecord { .. })
            if ledger.established_mode(name) == Some(ActivityMode::Duration) =>
        {
            ledger.log_value(name, day, TrackedValue::Duration(by))?
        }
        result => result?,
    };
    report(&applied.persistence);
    println!("{}\t{}", applied.record.formatted_value(), applied.record.name);
    Ok(())
}

pub fn start(app_dir: &Path, name: &str) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    let applied = ledger.start_tracking(name)?;
    report(&applied.persistence);
    if let Some(since) = applied.record.active_since {
        println!("Tracking {} since {}", applied.record.name, since.format("%H:%M"));
    }
    Ok(())
}

pub fn stop(app_dir: &Path, name: &str) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    let applied = ledger.stop_tracking(name)?;
    report(&applied.persistence);
    println!(
        "{}\t{}\t{}",
        applied.record.day,
        applied.record.formatted_value(),
        applied.record.name
    );
    Ok(())
}

pub fn delete(app_dir: &Path, name: &str) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    let key = RecordKey::new(name.trim(), ledger.today());

    let removed = ledger.delete(&key)?;
    report(&removed.persistence);
    println!("Deleted {} records of {}", removed.records.len(), key.name);
    Ok(())
}

pub fn today(app_dir: &Path) -> Result<()> {
    let ledger = open_ledger(app_dir)?;
    print!(
        "{}",
        render_today(ledger.today(), &ledger.today_entries(), styled())
    );
    Ok(())
}

pub fn history(app_dir: &Path) -> Result<()> {
    let ledger = open_ledger(app_dir)?;
    print!("{}", render_history(&ledger.history(), styled()));
    Ok(())
}

pub fn stats(app_dir: &Path, name: &str, weeks: u32) -> Result<()> {
    let ledger = open_ledger(app_dir)?;
    let Some(mode) = ledger.established_mode(name) else {
        bail!("No activity called {}", name.trim());
    };
    let stats = ledger.weekly_stats(name, weeks)?;
    print!("{}", render_stats(name.trim(), mode, &stats, styled()));
    Ok(())
}

pub fn export(app_dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let ledger = open_ledger(app_dir)?;
    let csv = ledger.export_csv();
    match output {
        Some(path) => {
            std::fs::write(&path, csv)?;
            info!("Exported {} records to {path:?}", ledger.len());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

pub fn reminder(app_dir: &Path, set: Option<&str>) -> Result<()> {
    let store = SettingsStore::new(app_dir);
    let settings = match set {
        Some(time) => {
            let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .map_err(|e| anyhow!("Failed to parse time {time}: {e}"))?;
            store.update_reminder(time)?
        }
        None => store.load()?,
    };
    println!("Daily reminder at {}", settings.daily_reminder.format("%H:%M"));
    Ok(())
}

/// Reports ledger changes until shutdown.
async fn report_changes(mut revisions: watch::Receiver<u64>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = revisions.changed() => {
                if changed.is_err() {
                    return;
                }
                let revision = *revisions.borrow_and_update();
                println!("{}\tledger updated (revision {revision})", Local::now().format("%x %H:%M:%S"));
            }
        }
    }
}

pub async fn watch(app_dir: &Path) -> Result<()> {
    let mut ledger = open_ledger(app_dir)?;
    print!(
        "{}",
        render_today(ledger.today(), &ledger.today_entries(), styled())
    );

    let shutdown = CancellationToken::new();
    let rollover = DayRollover::new(
        shutdown.clone(),
        ROLLOVER_CHECK_INTERVAL,
        Box::new(DefaultClock),
    );
    let revisions = ledger.subscribe();

    let (_, result, _) = tokio::join!(
        detect_shutdown(shutdown.clone()),
        rollover.run(&mut ledger),
        report_changes(revisions, shutdown.clone()),
    );
    result
}
