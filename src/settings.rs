use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SETTINGS_FILE: &str = "settings.json";

/// User preferences persisted next to the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Time of day the user wants to be reminded to log activities.
    #[serde(default = "default_reminder")]
    pub daily_reminder: NaiveTime,
}

fn default_reminder() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).expect("20:00 is a valid time")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daily_reminder: default_reminder(),
        }
    }
}

/// Reads and writes [Settings] inside the application directory.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            path: app_dir.join(SETTINGS_FILE),
        }
    }

    /// Missing settings file means defaults.
    pub fn load(&self) -> Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", self.path);
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        std::fs::write(&self.path, serde_json::to_vec_pretty(settings)?)?;
        Ok(())
    }

    pub fn update_reminder(&self, time: NaiveTime) -> Result<Settings> {
        let mut settings = self.load()?;
        settings.daily_reminder = time;
        self.save(&settings)?;
        info!("Daily reminder moved to {time}");
        Ok(settings)
    }
}
