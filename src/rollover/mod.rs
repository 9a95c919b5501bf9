//! Detects calendar day changes while the application keeps running and backfills today's
//! placeholders when one happens.

pub mod shutdown;

use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    ledger::{error::Persistence, Ledger},
    storage::ActivityStorage,
    utils::clock::Clock,
};

pub const ROLLOVER_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically checks what day it is. Runs on the same thread as everything else, a tick
/// always completes before the next one starts.
pub struct DayRollover {
    shutdown: CancellationToken,
    check_frequency: Duration,
    time_provider: Box<dyn Clock>,
    last_day: Option<NaiveDate>,
}

impl DayRollover {
    pub fn new(
        shutdown: CancellationToken,
        check_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            shutdown,
            check_frequency,
            time_provider,
            last_day: None,
        }
    }

    /// Returns true when the day differs from the one seen on the previous check.
    fn day_changed(&mut self) -> bool {
        let today = self.time_provider.today();
        match self.last_day.replace(today) {
            Some(previous) if previous != today => {
                info!("Day changed from {previous} to {today}");
                true
            }
            Some(_) => false,
            None => {
                debug!("Watching days starting from {today}");
                false
            }
        }
    }

    /// Executes the rollover loop until the shutdown token is cancelled.
    pub async fn run<S: ActivityStorage>(mut self, ledger: &mut Ledger<S>) -> Result<()> {
        let mut check_point = self.time_provider.instant();
        self.day_changed();
        loop {
            check_point += self.check_frequency;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(check_point) => ()
            }

            if self.day_changed() {
                let placeholders = ledger.ensure_today_placeholders();
                match placeholders.persistence {
                    Persistence::Failed(e) => {
                        error!("Placeholders for the new day weren't saved {e:?}")
                    }
                    Persistence::Saved | Persistence::Untouched => {
                        info!("Created {} placeholders", placeholders.created.len())
                    }
                }
            }
        }
    }
}
