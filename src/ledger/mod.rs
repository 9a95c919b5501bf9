//! The ledger keeps one record per activity name and calendar day.
//!  - Every write goes through [Ledger::log_value], [Ledger::increment_count],
//!    [Ledger::extend_duration], [Ledger::start_tracking], [Ledger::stop_tracking] or
//!    [Ledger::delete].
//!  - Every write is mirrored into an [ActivityStorage] right away. Storage failures are logged
//!    and reported back, but the in-memory state stays the source of truth.
//!  - Subscribers get a revision number bumped after each change through [Ledger::subscribe].

pub mod entities;
pub mod error;
pub mod export;
pub mod stats;

use std::{
    collections::{btree_map, BTreeMap},
    sync::Arc,
};

use chrono::{DateTime, Duration, Local, NaiveDate};
use entities::{ActivityMode, ActivityRecord, RecordKey, TrackedValue};
use error::{LedgerError, Persistence};
use stats::WeeklyStats;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    storage::{ActivityStorage, StorageError},
    utils::{clock::Clock, time::local_day},
};

/// Amount of time added by the quick "+15m" action.
pub const QUICK_EXTEND: Duration = Duration::minutes(15);

/// Result of a write that touched a single record.
#[derive(Debug)]
pub struct Applied {
    pub record: ActivityRecord,
    pub created: bool,
    pub persistence: Persistence,
}

/// Result of [Ledger::delete].
#[derive(Debug)]
pub struct Removed {
    pub records: Vec<ActivityRecord>,
    pub persistence: Persistence,
}

/// Result of [Ledger::ensure_today_placeholders].
#[derive(Debug)]
pub struct Placeholders {
    pub created: Vec<RecordKey>,
    pub persistence: Persistence,
}

pub struct Ledger<S: ActivityStorage> {
    storage: S,
    records: BTreeMap<RecordKey, ActivityRecord>,
    clock: Box<dyn Clock>,
    revision: watch::Sender<u64>,
}

impl<S: ActivityStorage> Ledger<S> {
    pub fn new(storage: S, clock: Box<dyn Clock>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            storage,
            records: BTreeMap::new(),
            clock,
            revision,
        }
    }

    /// Replaces in-memory state with the content of storage and creates today's placeholders.
    /// When storage can't be read the ledger is left empty. Duplicate documents of a (name, day)
    /// pair are removed from storage, the first fetched one is kept.
    #[instrument(skip(self))]
    pub fn load(&mut self) -> Result<Vec<ActivityRecord>, StorageError> {
        self.records.clear();
        let fetched = match self.storage.fetch_all() {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to load activities {e}");
                self.notify();
                return Err(e);
            }
        };

        let mut duplicates = 0;
        for record in fetched {
            match self.records.entry(record.key()) {
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(record);
                }
                btree_map::Entry::Occupied(entry) => {
                    if entry.get().id != record.id {
                        warn!("Removing duplicate record for {}", entry.key());
                        self.storage.delete(&record);
                        duplicates += 1;
                    }
                }
            }
        }
        info!("Loaded {} activity records", self.records.len());

        let placeholders = self.ensure_today_placeholders();
        if placeholders.created.is_empty() {
            if duplicates > 0 {
                // Failures are logged and the removals stay staged for the next commit
                let _ = self.persist();
            }
            self.notify();
        }

        Ok(self.records().into_iter().cloned().collect())
    }

    /// Makes sure every known activity has a record for today. Missing ones are created with a
    /// zero value in the activity's established mode.
    pub fn ensure_today_placeholders(&mut self) -> Placeholders {
        let today = self.clock.today();

        let mut modes = BTreeMap::<Arc<str>, ActivityMode>::new();
        for record in self.records.values() {
            // Records are ordered by day within a name, so the last one wins.
            modes.insert(record.name.clone(), record.mode);
        }

        let mut created = vec![];
        for (name, mode) in modes {
            let key = RecordKey::new(name.clone(), today);
            if self.records.contains_key(&key) {
                continue;
            }
            let record = ActivityRecord::new(name, today, TrackedValue::zero(mode));
            self.storage.insert(&record);
            self.records.insert(key.clone(), record);
            created.push(key);
        }

        if created.is_empty() {
            return Placeholders {
                created,
                persistence: Persistence::Untouched,
            };
        }

        info!("Created {} placeholders for {today}", created.len());
        let persistence = self.persist();
        self.notify();
        Placeholders {
            created,
            persistence,
        }
    }

    /// Sets the value of `name` for `day`, creating the record if needed. Existing values are
    /// overwritten, not accumulated.
    pub fn log_value(
        &mut self,
        name: &str,
        day: NaiveDate,
        value: TrackedValue,
    ) -> Result<Applied, LedgerError> {
        let name = validate_name(name)?;
        if !value.is_positive() {
            return Err(LedgerError::NonPositiveValue {
                name: name.to_string(),
            });
        }

        let key = RecordKey::new(name, day);
        let (record, created) = match self.records.get_mut(&key) {
            Some(record) => {
                record.set_value(value);
                (record.clone(), false)
            }
            None => {
                let record = ActivityRecord::new(key.name.clone(), day, value);
                self.records.insert(key.clone(), record.clone());
                (record, true)
            }
        };
        info!("Logged {key}: {}", record.formatted_value());

        Ok(self.apply(record, created))
    }

    /// Adds one to a count record.
    pub fn increment_count(&mut self, key: &RecordKey) -> Result<Applied, LedgerError> {
        let record = self.get_mut(key)?;
        if record.mode != ActivityMode::Count {
            return Err(LedgerError::NotCountMode { key: key.clone() });
        }
        record.count = record.count.saturating_add(1);
        let record = record.clone();
        debug!("Incremented {key} to {}", record.count);

        Ok(self.apply(record, false))
    }

    /// Adds `by` to a duration record.
    pub fn extend_duration(
        &mut self,
        key: &RecordKey,
        by: Duration,
    ) -> Result<Applied, LedgerError> {
        if by <= Duration::zero() {
            return Err(LedgerError::NonPositiveValue {
                name: key.name.to_string(),
            });
        }
        let record = self.get_mut(key)?;
        if record.mode != ActivityMode::Duration {
            return Err(LedgerError::NotDurationMode { key: key.clone() });
        }
        record.duration += by;
        let record = record.clone();
        debug!("Extended {key} to {}", record.formatted_value());

        Ok(self.apply(record, false))
    }

    /// Starts tracking `name` live on today's record, creating a zero duration record when
    /// there is none yet.
    pub fn start_tracking(&mut self, name: &str) -> Result<Applied, LedgerError> {
        let name = validate_name(name)?;
        if let Some((key, _)) = self.tracking(name) {
            return Err(LedgerError::AlreadyTracking { key });
        }

        let now = self.clock.time();
        let key = RecordKey::new(name, local_day(&now));
        let mode = self
            .records
            .get(&key)
            .map(|record| record.mode)
            .or_else(|| self.established_mode(name));
        if mode == Some(ActivityMode::Count) {
            return Err(LedgerError::NotDurationMode { key });
        }

        let created = !self.records.contains_key(&key);
        let record = self.records.entry(key.clone()).or_insert_with(|| {
            ActivityRecord::new(
                key.name.clone(),
                key.day,
                TrackedValue::zero(ActivityMode::Duration),
            )
        });
        record.active_since = Some(now);
        let record = record.clone();
        info!("Started tracking {key} at {}", now.format("%H:%M:%S"));

        Ok(self.apply(record, created))
    }

    /// Stops live tracking of `name`. Elapsed time becomes today's value of the activity,
    /// replacing what was logged before. Stopping within the same second only clears the
    /// marker.
    pub fn stop_tracking(&mut self, name: &str) -> Result<Applied, LedgerError> {
        let name = validate_name(name)?;
        let Some((started, since)) = self.tracking(name) else {
            return Err(LedgerError::NotTracking {
                name: name.to_string(),
            });
        };

        let now = self.clock.time();
        let elapsed = Duration::seconds((now - since).num_seconds());
        let record = self.get_mut(&started)?;
        record.active_since = None;
        let record = record.clone();
        info!("Stopped tracking {started} after {}s", elapsed.num_seconds());

        if elapsed <= Duration::zero() {
            return Ok(self.apply(record, false));
        }
        self.storage.insert(&record);
        self.log_value(name, local_day(&now), TrackedValue::Duration(elapsed))
    }

    /// Removes every record sharing the name of `key`, whatever the day.
    pub fn delete(&mut self, key: &RecordKey) -> Result<Removed, LedgerError> {
        let keys = self
            .name_range(&key.name)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return Err(LedgerError::UnknownRecord { key: key.clone() });
        }

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.records.remove(&key) {
                self.storage.delete(&record);
                records.push(record);
            }
        }
        info!("Deleted {} records of {}", records.len(), key.name);

        let persistence = self.persist();
        self.notify();
        Ok(Removed {
            records,
            persistence,
        })
    }

    /// Totals of `name` for the last `weeks` Sunday-anchored weeks, oldest first.
    pub fn weekly_stats(&self, name: &str, weeks: u32) -> Result<Vec<WeeklyStats>, LedgerError> {
        let name = name.trim();
        stats::weekly_stats(
            self.name_range(name).map(|(_, record)| record),
            name,
            self.clock.today(),
            weeks,
        )
    }

    pub fn export_csv(&self) -> String {
        export::to_csv(self.records.values())
    }

    /// All records, most recent day first.
    pub fn records(&self) -> Vec<&ActivityRecord> {
        let mut records = self.records.values().collect::<Vec<_>>();
        records.sort_by(|a, b| b.day.cmp(&a.day).then_with(|| a.name.cmp(&b.name)));
        records
    }

    pub fn get(&self, key: &RecordKey) -> Option<&ActivityRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct activity names, sorted.
    pub fn names(&self) -> Vec<Arc<str>> {
        let mut names = self
            .records
            .keys()
            .map(|key| key.name.clone())
            .collect::<Vec<_>>();
        names.dedup();
        names
    }

    /// Mode of the most recent record of `name`.
    pub fn established_mode(&self, name: &str) -> Option<ActivityMode> {
        self.name_range(name.trim())
            .next_back()
            .map(|(_, record)| record.mode)
    }

    /// Today's record of every activity, sorted by name. Activities without a record for today
    /// get a zero valued record that isn't stored.
    pub fn today_entries(&self) -> Vec<ActivityRecord> {
        let today = self.clock.today();
        self.names()
            .into_iter()
            .map(|name| {
                let key = RecordKey::new(name.clone(), today);
                self.records.get(&key).cloned().unwrap_or_else(|| {
                    let mode = self
                        .established_mode(&name)
                        .unwrap_or(ActivityMode::Duration);
                    ActivityRecord::new(name, today, TrackedValue::zero(mode))
                })
            })
            .collect()
    }

    /// Past records with a value, grouped by day.
    pub fn history(&self) -> BTreeMap<NaiveDate, Vec<&ActivityRecord>> {
        let today = self.clock.today();
        let mut history = BTreeMap::<NaiveDate, Vec<&ActivityRecord>>::new();
        for record in self.records.values() {
            if record.day == today || record.is_zero() {
                continue;
            }
            history.entry(record.day).or_default().push(record);
        }
        history
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Receives a new revision number after every change of the ledger.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// The record of `name` being tracked live and the moment tracking started.
    pub fn tracking(&self, name: &str) -> Option<(RecordKey, DateTime<Local>)> {
        self.name_range(name.trim()).find_map(|(key, record)| {
            record.active_since.map(|since| (key.clone(), since))
        })
    }

    fn get_mut(&mut self, key: &RecordKey) -> Result<&mut ActivityRecord, LedgerError> {
        self.records
            .get_mut(key)
            .ok_or_else(|| LedgerError::UnknownRecord { key: key.clone() })
    }

    fn name_range(&self, name: &str) -> btree_map::Range<'_, RecordKey, ActivityRecord> {
        let name: Arc<str> = name.into();
        self.records.range(
            RecordKey::new(name.clone(), NaiveDate::MIN)..=RecordKey::new(name, NaiveDate::MAX),
        )
    }

    fn apply(&mut self, record: ActivityRecord, created: bool) -> Applied {
        self.storage.insert(&record);
        let persistence = self.persist();
        self.notify();
        Applied {
            record,
            created,
            persistence,
        }
    }

    fn persist(&mut self) -> Persistence {
        match self.storage.commit() {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                error!("Failed to save activities {e}");
                Persistence::Failed(e)
            }
        }
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

fn validate_name(name: &str) -> Result<&str, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        Err(LedgerError::EmptyName)
    } else {
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use anyhow::Result;
    use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone};
    use tempfile::tempdir;

    use crate::{
        ledger::{
            entities::{ActivityMode, ActivityRecord, RecordKey, TrackedValue},
            error::{LedgerError, Persistence},
            Ledger, QUICK_EXTEND,
        },
        storage::{json_storage::JsonFileStorage, ActivityStorage, MockActivityStorage, StorageError},
        utils::{
            clock::{Clock, FixedClock},
            logging::TEST_LOGGING,
        },
    };

    // Wednesday
    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
    const NEW_YEAR: NaiveDate = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    fn clock_at(day: NaiveDate) -> Box<dyn Clock> {
        clock_at_time(day, 12, 0)
    }

    fn clock_at_time(day: NaiveDate, hour: u32, minute: u32) -> Box<dyn Clock> {
        let time = day.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
        Box::new(FixedClock(Local.from_local_datetime(&time).unwrap()))
    }

    fn file_ledger(dir: &std::path::Path) -> Result<Ledger<JsonFileStorage>> {
        Ok(Ledger::new(
            JsonFileStorage::new(dir.to_path_buf())?,
            clock_at(TODAY),
        ))
    }

    fn hours(value: i64) -> TrackedValue {
        TrackedValue::Duration(Duration::hours(value))
    }

    fn failing_commit_storage() -> MockActivityStorage {
        let mut storage = MockActivityStorage::new();
        storage.expect_fetch_all().returning(|| Ok(vec![]));
        storage.expect_insert().return_const(());
        storage.expect_delete().return_const(());
        storage
            .expect_commit()
            .returning(|| Err(StorageError::Io(io::Error::other("disk full"))));
        storage
    }

    #[test]
    fn test_log_then_load() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;
        ledger.load()?;

        let applied = ledger.log_value("Reading", NEW_YEAR, hours(1))?;
        assert!(applied.created);
        assert!(matches!(applied.persistence, Persistence::Saved));

        let mut reloaded = file_ledger(dir.path())?;
        let records = reloaded.load()?;
        let matching = records
            .iter()
            .filter(|v| v.key() == RecordKey::new("Reading", NEW_YEAR))
            .collect::<Vec<_>>();

        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].value(), hours(1));
        Ok(())
    }

    #[test]
    fn test_log_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", NEW_YEAR, hours(1))?;
        let applied = ledger.log_value(" Reading ", NEW_YEAR, hours(3))?;
        assert!(!applied.created);

        let mut reloaded = file_ledger(dir.path())?;
        reloaded.load()?;
        let key = RecordKey::new("Reading", NEW_YEAR);
        assert_eq!(reloaded.get(&key).map(|v| v.value()), Some(hours(3)));
        assert_eq!(reloaded.names().len(), 1);
        Ok(())
    }

    #[test]
    fn test_log_overwrites_mode() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Stretching", TODAY, hours(1))?;
        ledger.log_value("Stretching", TODAY, TrackedValue::Count(4))?;

        let key = RecordKey::new("Stretching", TODAY);
        assert_eq!(ledger.get(&key).map(|v| v.value()), Some(TrackedValue::Count(4)));
        assert_eq!(ledger.established_mode("Stretching"), Some(ActivityMode::Count));
        Ok(())
    }

    #[test]
    fn test_log_validation() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        assert_eq!(
            ledger.log_value("   ", TODAY, hours(1)).unwrap_err(),
            LedgerError::EmptyName
        );
        assert!(matches!(
            ledger.log_value("Reading", TODAY, TrackedValue::Count(0)),
            Err(LedgerError::NonPositiveValue { .. })
        ));
        assert!(matches!(
            ledger.log_value("Reading", TODAY, TrackedValue::Duration(Duration::seconds(-1))),
            Err(LedgerError::NonPositiveValue { .. })
        ));
        assert!(ledger.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete_cascades_by_name() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        for day in 0..10 {
            ledger.log_value("Reading", NEW_YEAR + Duration::days(day), hours(1))?;
            ledger.log_value("Gym", NEW_YEAR + Duration::days(day), TrackedValue::Count(1))?;
        }

        let removed = ledger.delete(&RecordKey::new("Reading", NEW_YEAR))?;
        assert_eq!(removed.records.len(), 10);
        assert!(matches!(removed.persistence, Persistence::Saved));

        let mut reloaded = file_ledger(dir.path())?;
        let records = reloaded.load()?;
        assert!(records.iter().all(|v| &*v.name == "Gym"));
        // 10 logged days and today's placeholder
        assert_eq!(records.len(), 11);

        assert!(matches!(
            ledger.delete(&RecordKey::new("Reading", NEW_YEAR)),
            Err(LedgerError::UnknownRecord { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_weekly_stats_window() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", TODAY, hours(1))?;
        ledger.log_value("Reading", TODAY - Duration::days(10), hours(2))?;
        ledger.log_value("Reading", TODAY - Duration::days(60), hours(5))?;
        ledger.log_value("Gym", TODAY, hours(1))?;

        let stats = ledger.weekly_stats("Reading", 4)?;
        assert_eq!(stats.len(), 4);
        assert_eq!(
            stats.iter().map(|v| v.total_duration).sum::<Duration>(),
            Duration::hours(3)
        );
        assert!(stats.windows(2).all(|v| v[0].week_start < v[1].week_start));

        assert_eq!(ledger.weekly_stats("Unknown", 4)?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_weekly_stats_after_mode_change() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", TODAY, TrackedValue::Count(3))?;
        ledger.log_value("Reading", TODAY, TrackedValue::Duration(Duration::minutes(30)))?;

        let stats = ledger.weekly_stats("Reading", 1)?;
        assert_eq!(stats[0].total_count, 0);
        assert_eq!(stats[0].total_duration, Duration::minutes(30));
        Ok(())
    }

    #[test]
    fn test_weekly_stats_rejects_huge_window() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;
        ledger.log_value("Reading", TODAY, hours(1))?;

        assert!(matches!(
            ledger.weekly_stats("Reading", 14_000_000),
            Err(LedgerError::TooManyWeeks { .. })
        ));
        assert!(ledger.weekly_stats("Reading", 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_increment_count() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Pushups", TODAY, TrackedValue::Count(5))?;
        let applied = ledger.increment_count(&RecordKey::new("Pushups", TODAY))?;
        assert_eq!(applied.record.count, 6);

        ledger.log_value("Reading", TODAY, hours(1))?;
        let key = RecordKey::new("Reading", TODAY);
        assert!(matches!(
            ledger.increment_count(&key),
            Err(LedgerError::NotCountMode { .. })
        ));
        assert_eq!(ledger.get(&key).map(|v| v.count), Some(0));
        Ok(())
    }

    #[test]
    fn test_extend_duration() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", TODAY, hours(1))?;
        let key = RecordKey::new("Reading", TODAY);
        let applied = ledger.extend_duration(&key, QUICK_EXTEND)?;
        assert_eq!(applied.record.duration, Duration::minutes(75));

        ledger.log_value("Pushups", TODAY, TrackedValue::Count(5))?;
        assert!(matches!(
            ledger.extend_duration(&RecordKey::new("Pushups", TODAY), QUICK_EXTEND),
            Err(LedgerError::NotDurationMode { .. })
        ));
        assert!(matches!(
            ledger.extend_duration(&RecordKey::new("Missing", TODAY), QUICK_EXTEND),
            Err(LedgerError::UnknownRecord { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_export_example_row() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", NEW_YEAR, TrackedValue::Duration(Duration::seconds(3600)))?;

        let csv = ledger.export_csv();
        assert!(csv.lines().any(|v| v == "2024-01-01,Reading,duration,1.00,0"));
        Ok(())
    }

    #[test]
    fn test_placeholders_keep_last_mode() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", NEW_YEAR, hours(1))?;
        ledger.log_value("Gym", NEW_YEAR, hours(1))?;
        ledger.log_value("Gym", NEW_YEAR + Duration::days(1), TrackedValue::Count(3))?;

        let placeholders = ledger.ensure_today_placeholders();
        assert_eq!(placeholders.created.len(), 2);
        assert!(matches!(placeholders.persistence, Persistence::Saved));

        let reading = ledger.get(&RecordKey::new("Reading", TODAY)).unwrap();
        assert_eq!(reading.value(), TrackedValue::zero(ActivityMode::Duration));
        let gym = ledger.get(&RecordKey::new("Gym", TODAY)).unwrap();
        assert_eq!(gym.value(), TrackedValue::zero(ActivityMode::Count));

        let again = ledger.ensure_today_placeholders();
        assert!(again.created.is_empty());
        assert!(matches!(again.persistence, Persistence::Untouched));
        Ok(())
    }

    #[test]
    fn test_failed_commit_keeps_memory() -> Result<()> {
        let mut ledger = Ledger::new(failing_commit_storage(), clock_at(TODAY));
        ledger.load()?;

        let applied = ledger.log_value("Reading", TODAY, hours(2))?;
        assert!(applied.persistence.is_failed());
        assert_eq!(
            ledger.get(&RecordKey::new("Reading", TODAY)).map(|v| v.value()),
            Some(hours(2))
        );

        let removed = ledger.delete(&RecordKey::new("Reading", TODAY))?;
        assert!(removed.persistence.is_failed());
        assert!(ledger.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_fetch_leaves_empty_ledger() -> Result<()> {
        let mut storage = MockActivityStorage::new();
        storage.expect_fetch_all().returning(|| {
            Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "locked",
            )))
        });
        let mut broken = Ledger::new(storage, clock_at(TODAY));

        assert!(broken.load().is_err());
        assert!(broken.is_empty());
        Ok(())
    }

    fn store_duplicates(dir: &std::path::Path) -> Result<()> {
        let mut storage = JsonFileStorage::new(dir.to_path_buf())?;
        storage.insert(&ActivityRecord::new("Reading", TODAY, TrackedValue::Count(1)));
        storage.insert(&ActivityRecord::new("Reading", TODAY, TrackedValue::Count(2)));
        storage.insert(&ActivityRecord::new("Gym", TODAY, TrackedValue::Count(4)));
        storage.commit()?;
        Ok(())
    }

    #[test]
    fn test_load_collapses_duplicates() -> Result<()> {
        let dir = tempdir()?;
        store_duplicates(dir.path())?;

        let mut ledger = file_ledger(dir.path())?;
        let records = ledger.load()?;
        assert_eq!(records.len(), 2);

        let mut storage = JsonFileStorage::new(dir.path().to_path_buf())?;
        let stored = storage.fetch_all()?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.iter().filter(|v| &*v.name == "Reading").count(), 1);
        Ok(())
    }

    #[test]
    fn test_delete_reaches_stored_duplicates() -> Result<()> {
        let dir = tempdir()?;
        store_duplicates(dir.path())?;

        let mut ledger = file_ledger(dir.path())?;
        ledger.load()?;
        let removed = ledger.delete(&RecordKey::new("Reading", TODAY))?;
        assert_eq!(removed.records.len(), 1);

        let mut reloaded = file_ledger(dir.path())?;
        let records = reloaded.load()?;
        assert!(records.iter().all(|v| &*v.name != "Reading"));
        assert_eq!(records.len(), 1);
        Ok(())
    }

    #[test]
    fn test_start_stop_tracking() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = Ledger::new(
            JsonFileStorage::new(dir.path().to_path_buf())?,
            clock_at_time(TODAY, 12, 0),
        );
        ledger.load()?;

        let started = ledger.start_tracking("Reading")?;
        assert!(started.created);
        assert!(started.record.is_tracking());
        assert!(started.record.is_zero());

        // Stopping happens in a later run of the application
        let mut later = Ledger::new(
            JsonFileStorage::new(dir.path().to_path_buf())?,
            clock_at_time(TODAY, 13, 30),
        );
        later.load()?;
        assert_eq!(
            later.tracking("Reading").map(|(key, _)| key),
            Some(RecordKey::new("Reading", TODAY))
        );

        let stopped = later.stop_tracking(" Reading ")?;
        assert!(!stopped.record.is_tracking());
        assert_eq!(stopped.record.value(), TrackedValue::Duration(Duration::minutes(90)));
        assert!(later.tracking("Reading").is_none());

        let mut reloaded = file_ledger(dir.path())?;
        reloaded.load()?;
        let record = reloaded.get(&RecordKey::new("Reading", TODAY)).unwrap();
        assert_eq!(record.value(), TrackedValue::Duration(Duration::minutes(90)));
        assert!(!record.is_tracking());
        Ok(())
    }

    #[test]
    fn test_tracking_validation() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Pushups", NEW_YEAR, TrackedValue::Count(5))?;
        assert!(matches!(
            ledger.start_tracking("Pushups"),
            Err(LedgerError::NotDurationMode { .. })
        ));
        assert!(ledger.get(&RecordKey::new("Pushups", TODAY)).is_none());

        assert!(matches!(
            ledger.stop_tracking("Reading"),
            Err(LedgerError::NotTracking { .. })
        ));

        ledger.log_value("Reading", TODAY, hours(1))?;
        ledger.start_tracking("Reading")?;
        assert!(matches!(
            ledger.start_tracking("Reading"),
            Err(LedgerError::AlreadyTracking { .. })
        ));

        // The clock didn't move, so stopping only clears the marker
        let stopped = ledger.stop_tracking("Reading")?;
        assert!(!stopped.record.is_tracking());
        assert_eq!(stopped.record.value(), hours(1));
        Ok(())
    }

    #[test]
    fn test_dashboard_and_history() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;

        ledger.log_value("Reading", NEW_YEAR, hours(1))?;
        ledger.log_value("Gym", TODAY, TrackedValue::Count(2))?;
        ledger.log_value("Gym", NEW_YEAR, TrackedValue::Count(1))?;

        let today = ledger.today_entries();
        assert_eq!(
            today.iter().map(|v| &*v.name).collect::<Vec<_>>(),
            vec!["Gym", "Reading"]
        );
        assert!(today[1].is_zero());
        // Displaying the dashboard doesn't create records
        assert!(ledger.get(&RecordKey::new("Reading", TODAY)).is_none());

        let history = ledger.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[&NEW_YEAR].len(), 2);
        Ok(())
    }

    #[test]
    fn test_subscribers_see_changes() -> Result<()> {
        let dir = tempdir()?;
        let mut ledger = file_ledger(dir.path())?;
        let mut receiver = ledger.subscribe();

        ledger.log_value("Reading", TODAY, hours(1))?;
        assert!(receiver.has_changed()?);
        let seen = *receiver.borrow_and_update();

        assert!(ledger.log_value("", TODAY, hours(1)).is_err());
        assert!(!receiver.has_changed()?);

        let _ = ledger.increment_count(&RecordKey::new("Reading", TODAY));
        ledger.extend_duration(&RecordKey::new("Reading", TODAY), QUICK_EXTEND)?;
        assert!(*receiver.borrow() > seen);
        Ok(())
    }
}
