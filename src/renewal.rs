//! Cancellable polling task used while a credential renewal is pending.

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Repeating timer that can be started once and cancelled for good
///
/// While inactive, [`PollTask::tick`] never completes, so the task can sit
/// in a `select!` next to other event sources.
#[derive(Debug)]
pub struct PollTask {
    period: Duration,
    interval: Option<Interval>,
}

impl PollTask {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Start polling; the first tick fires one full period from now.
    ///
    /// Returns false, leaving the running schedule untouched, if the task is
    /// already active.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
        true
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    /// Wait for the next tick
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
