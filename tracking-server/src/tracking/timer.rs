//! Elapsed delivery time.
//!
//! While a shipment is in transit, the UI shows how long it has been on the
//! road, counted from the start instant the backend recorded. The start
//! instant comes from a remote clock; the local clock may disagree with it
//! and no correction is attempted, so the elapsed value can even be
//! negative. Once the backend reports an authoritative duration the live
//! count is no longer consulted.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{ShipmentRecord, ShipmentStatus};

/// Live elapsed time since a remote start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedTimer {
    started_at: DateTime<Utc>,
}

impl ElapsedTimer {
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Raw wall-clock delta from the start instant to now.
    pub fn tick(&self) -> TimeDelta {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.started_at
    }

    /// Whole seconds elapsed at `now`.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.tick_at(now).num_seconds()
    }
}

/// Format a duration as `HH:MM:SS`. Hours are not wrapped at 24, and
/// negative durations get a leading `-`.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let secs = total.unsigned_abs();

    format!(
        "{sign}{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Which duration a shipment view should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryClock {
    /// Not in transit and no final duration yet.
    NotStarted,

    /// In transit with a known start: count live.
    Live(ElapsedTimer),

    /// The backend's authoritative duration, in seconds.
    Final(u64),
}

impl DeliveryClock {
    /// Pick the clock for a shipment record.
    ///
    /// An authoritative `actual_duration` wins whenever present.
    pub fn from_record(record: &ShipmentRecord) -> Self {
        if let Some(secs) = record.route_info.actual_duration {
            return DeliveryClock::Final(secs);
        }

        match (&record.status, record.route_info.route_started) {
            (ShipmentStatus::InTransit, Some(started)) => {
                DeliveryClock::Live(ElapsedTimer::start(started))
            }
            _ => DeliveryClock::NotStarted,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DeliveryClock::Live(_))
    }

    /// Formatted duration, or `None` when there is nothing to show.
    pub fn display(&self) -> Option<String> {
        self.display_at(Utc::now())
    }

    pub fn display_at(&self, now: DateTime<Utc>) -> Option<String> {
        match self {
            DeliveryClock::NotStarted => None,
            DeliveryClock::Live(timer) => Some(format_elapsed(timer.tick_at(now))),
            DeliveryClock::Final(secs) => {
                let elapsed = i64::try_from(*secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .unwrap_or(TimeDelta::MAX);
                Some(format_elapsed(elapsed))
            }
        }
    }
}

/// Republishes a timer's formatted value once a second until stopped.
///
/// Dropping the ticker stops it.
pub struct ElapsedTicker {
    timer: ElapsedTimer,
    cancel: CancellationToken,
    display: watch::Receiver<String>,
    task: Option<JoinHandle<()>>,
}

impl ElapsedTicker {
    pub fn spawn(timer: ElapsedTimer) -> Self {
        let cancel = CancellationToken::new();
        let (tx, display) = watch::channel(format_elapsed(timer.tick()));

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        tx.send_replace(format_elapsed(timer.tick()));
                    }
                }
            }
            debug!(started_at = %timer.started_at(), "elapsed ticker stopped");
        });

        Self {
            timer,
            cancel,
            display,
            task: Some(task),
        }
    }

    pub fn timer(&self) -> ElapsedTimer {
        self.timer
    }

    /// Most recently published value.
    pub fn current(&self) -> String {
        self.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.display.clone()
    }

    /// Stop ticking and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(started_at = %self.timer.started_at(), error = %err, "elapsed ticker ended abnormally");
        }
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::{RouteInfo, ShipmentId};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(status: ShipmentStatus, info: RouteInfo) -> ShipmentRecord {
        ShipmentRecord {
            id: ShipmentId::parse("SHP-1").unwrap(),
            status,
            route_info: info,
        }
    }

    #[test]
    fn tick_counts_from_start() {
        let timer = ElapsedTimer::start(Utc::now() - TimeDelta::seconds(125));
        let ms = timer.tick().num_milliseconds();
        assert!((125_000..126_000).contains(&ms), "got {ms}ms");
    }

    #[test]
    fn tick_at_is_raw_delta() {
        let timer = ElapsedTimer::start(at(100));
        assert_eq!(timer.elapsed_seconds(at(190)), 90);
        // Remote clock ahead of ours
        assert_eq!(timer.elapsed_seconds(at(40)), -60);
    }

    #[test]
    fn formats() {
        assert_eq!(format_elapsed(TimeDelta::zero()), "00:00:00");
        assert_eq!(format_elapsed(TimeDelta::seconds(125)), "00:02:05");
        assert_eq!(format_elapsed(TimeDelta::seconds(3_723)), "01:02:03");
        assert_eq!(format_elapsed(TimeDelta::seconds(90_000)), "25:00:00");
        assert_eq!(format_elapsed(TimeDelta::seconds(-61)), "-00:01:01");
        assert_eq!(format_elapsed(TimeDelta::milliseconds(1_999)), "00:00:01");
    }

    #[test]
    fn final_duration_wins() {
        let info = RouteInfo {
            route_started: Some(at(0)),
            actual_duration: Some(5_400),
        };
        let clock = DeliveryClock::from_record(&record(ShipmentStatus::InTransit, info));
        assert_eq!(clock, DeliveryClock::Final(5_400));
        assert_eq!(clock.display().as_deref(), Some("01:30:00"));
    }

    #[test]
    fn in_transit_counts_live() {
        let info = RouteInfo {
            route_started: Some(at(0)),
            actual_duration: None,
        };
        let clock = DeliveryClock::from_record(&record(ShipmentStatus::InTransit, info));
        assert!(clock.is_live());
        assert_eq!(clock.display_at(at(65)).as_deref(), Some("00:01:05"));
    }

    #[test]
    fn not_started_without_start_or_transit() {
        let no_start = record(ShipmentStatus::InTransit, RouteInfo::default());
        assert_eq!(DeliveryClock::from_record(&no_start), DeliveryClock::NotStarted);

        let pending = record(
            ShipmentStatus::Pending,
            RouteInfo {
                route_started: Some(at(0)),
                actual_duration: None,
            },
        );
        assert_eq!(DeliveryClock::from_record(&pending), DeliveryClock::NotStarted);
        assert_eq!(DeliveryClock::NotStarted.display(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_publishes_every_second() {
        let ticker = ElapsedTicker::spawn(ElapsedTimer::start(Utc::now()));
        let mut rx = ticker.subscribe();
        rx.borrow_and_update();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(rx.has_changed().unwrap());
        assert!(ticker.current().starts_with("00:00:0"));

        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticker_closes_channel() {
        let ticker = ElapsedTicker::spawn(ElapsedTimer::start(Utc::now()));
        let mut rx = ticker.subscribe();

        ticker.stop().await;

        rx.borrow_and_update();
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_ticker_stops() {
        let ticker = ElapsedTicker::spawn(ElapsedTimer::start(Utc::now()));
        let mut rx = ticker.subscribe();
        drop(ticker);

        tokio::time::sleep(Duration::from_secs(2)).await;
        rx.borrow_and_update();
        assert!(rx.changed().await.is_err());
    }
}
