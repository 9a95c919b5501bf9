use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Duration, Local, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How values of an activity are measured. Fixed when the name is first logged and expected to
/// stay the same across its history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityMode {
    Duration,
    Count,
}

impl Display for ActivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityMode::Duration => write!(f, "duration"),
            ActivityMode::Count => write!(f, "count"),
        }
    }
}

/// The identity of a record inside the ledger. There is at most one record per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub name: Arc<str>,
    pub day: NaiveDate,
}

impl RecordKey {
    pub fn new(name: impl Into<Arc<str>>, day: NaiveDate) -> Self {
        Self {
            name: name.into(),
            day,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.name, self.day)
    }
}

/// A value supplied when logging an activity. The variant decides the mode of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedValue {
    Duration(Duration),
    Count(u32),
}

impl TrackedValue {
    pub fn mode(&self) -> ActivityMode {
        match self {
            TrackedValue::Duration(_) => ActivityMode::Duration,
            TrackedValue::Count(_) => ActivityMode::Count,
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            TrackedValue::Duration(duration) => *duration > Duration::zero(),
            TrackedValue::Count(count) => *count > 0,
        }
    }

    /// Zero value for the mode. Used for placeholders.
    pub fn zero(mode: ActivityMode) -> Self {
        match mode {
            ActivityMode::Duration => TrackedValue::Duration(Duration::zero()),
            ActivityMode::Count => TrackedValue::Count(0),
        }
    }
}

/// One entry of the ledger: what was tracked for an activity during a single day.
///
/// Both `duration` and `count` are always present, but only the one matching `mode` carries
/// meaning.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub name: Arc<str>,
    pub mode: ActivityMode,
    pub day: NaiveDate,
    #[serde(with = "duration_ser")]
    pub duration: Duration,
    #[serde(default)]
    pub count: u32,
    /// Set while time is being tracked live. Stopping turns the elapsed time into the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_since: Option<DateTime<Local>>,
}

impl ActivityRecord {
    pub fn new(name: impl Into<Arc<str>>, day: NaiveDate, value: TrackedValue) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mode: value.mode(),
            day,
            duration: Duration::zero(),
            count: 0,
            active_since: None,
        };
        record.set_value(value);
        record
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            name: self.name.clone(),
            day: self.day,
        }
    }

    /// The authoritative value according to the mode.
    pub fn value(&self) -> TrackedValue {
        match self.mode {
            ActivityMode::Duration => TrackedValue::Duration(self.duration),
            ActivityMode::Count => TrackedValue::Count(self.count),
        }
    }

    /// Overwrites mode and the matching value. The other field is left as is.
    pub fn set_value(&mut self, value: TrackedValue) {
        self.mode = value.mode();
        match value {
            TrackedValue::Duration(duration) => self.duration = duration,
            TrackedValue::Count(count) => self.count = count,
        }
    }

    pub fn is_zero(&self) -> bool {
        !self.value().is_positive()
    }

    /// Short human readable form of the value, like `1h 5m` or `12`.
    pub fn formatted_value(&self) -> String {
        match self.mode {
            ActivityMode::Duration => {
                let hours = self.duration.num_hours();
                let minutes = self.duration.num_minutes() % 60;
                if hours > 0 {
                    format!("{hours}h {minutes}m")
                } else {
                    format!("{minutes}m")
                }
            }
            ActivityMode::Count => self.count.to_string(),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.active_since.is_some()
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(s))
    }
}
