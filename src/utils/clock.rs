use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use tokio::time::Instant;

use super::time::local_day;

/// Represents an entity responsible for providing dates across application. This allows the
/// ledger and the rollover loop to be driven by a fake clock in tests.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);

    /// Current local calendar day.
    fn today(&self) -> NaiveDate {
        local_day(&self.time())
    }
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// A clock frozen at a single moment. Sleeping still follows tokio time.
#[cfg(test)]
#[derive(Clone)]
pub struct FixedClock(pub DateTime<Local>);

#[cfg(test)]
#[async_trait]
impl Clock for FixedClock {
    fn time(&self) -> DateTime<Local> {
        self.0
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// Moves together with tokio time starting from `start`. Useful with paused tokio time.
#[cfg(test)]
#[derive(Clone)]
pub struct FollowingClock {
    start: DateTime<Local>,
    reference: Instant,
}

#[cfg(test)]
impl FollowingClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            start,
            reference: Instant::now(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for FollowingClock {
    fn time(&self) -> DateTime<Local> {
        self.start + self.reference.elapsed()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
