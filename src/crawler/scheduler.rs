//! Crawl triggers
//!
//! This module handles:
//! - Computing the next firing of the daily trigger in its time zone
//! - The daemon loop: one combined run at startup, then one per day
//! - Stopping cleanly on Ctrl-C between runs
//!
//! Overlap between triggers is prevented by the coordinator's run lock, not
//! here.

use crate::config::ScheduleConfig;
use crate::crawler::coordinator::Coordinator;
use crate::ConfigError;
use chrono::{
    DateTime, Duration as ChronoDuration, FixedOffset, LocalResult, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use std::fmt;
use std::time::Duration;

/// Step used to walk out of a daylight-saving gap
const GAP_STEP_MINUTES: i64 = 15;

/// Longest daylight-saving gap searched, in steps
const GAP_MAX_STEPS: i64 = 4 * 6;

/// Zone the daily wall-clock time is read in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerZone {
    /// IANA zone, following its daylight-saving rules
    Named(Tz),

    /// Fixed offset from UTC
    Fixed(FixedOffset),
}

impl fmt::Display for TriggerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => f.write_str(tz.name()),
            Self::Fixed(offset) => write!(f, "UTC{}", offset),
        }
    }
}

/// A trigger firing once a day at a fixed wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    at: NaiveTime,
    zone: TriggerZone,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, zone: TriggerZone) -> Self {
        Self { at, zone }
    }

    /// Builds the trigger; a configured fixed offset wins over the zone name
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let zone = match config.offset()? {
            Some(offset) => TriggerZone::Fixed(offset),
            None => TriggerZone::Named(config.tz()?),
        };
        Ok(Self::new(config.time_of_day()?, zone))
    }

    pub fn zone(&self) -> TriggerZone {
        self.zone
    }

    /// The first firing strictly after `now`
    ///
    /// A wall-clock time skipped by a daylight-saving jump fires when the
    /// clock resumes; one repeated by a fall-back fires on its first pass.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.zone {
            TriggerZone::Named(tz) => next_in_zone(&tz, self.at, now),
            TriggerZone::Fixed(offset) => next_in_zone(&offset, self.at, now),
        }
    }

    /// How long to sleep from `now` until the next firing
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_fire_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

fn next_in_zone<Z: TimeZone>(zone: &Z, at: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.with_timezone(zone).date_naive();

    (0..=2)
        .filter_map(|days| today.checked_add_signed(ChronoDuration::days(days)))
        .filter_map(|date| first_instant(zone, date.and_time(at)))
        .find(|fire| *fire > now)
        .unwrap_or_else(|| now + ChronoDuration::days(1))
}

fn first_instant<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..=GAP_MAX_STEPS).find_map(|step| {
        let candidate = local + ChronoDuration::minutes(step * GAP_STEP_MINUTES);
        match zone.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    })
}

/// Runs the trigger loop until Ctrl-C
///
/// With `run_on_startup` set, both crawls run once before the first wait.
/// Crawl failures are logged by the coordinator and never end the loop.
pub async fn run_daemon(
    coordinator: &Coordinator,
    trigger: DailyTrigger,
    run_on_startup: bool,
) {
    if run_on_startup {
        tracing::info!("Initial crawl started");
        let report = coordinator.run_all().await;
        tracing::info!("Initial crawl finished: {:?}", report);
    }

    loop {
        let next = trigger.next_fire_after(Utc::now());
        tracing::info!("Next daily crawl at {} ({})", next, trigger.zone());

        tokio::select! {
            _ = tokio::time::sleep(trigger.delay_from(Utc::now())) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, stopping scheduler");
                return;
            }
        }

        tracing::info!("Daily crawl started");
        let report = coordinator.run_all().await;
        tracing::info!("Daily crawl finished: {:?}", report);
    }
}
