//! Per-shipment tracking state machine.
//!
//! A [`TrackingSession`] owns everything about tracking one shipment: its
//! status, the last accepted sample and the [`HistoryBuffer`]. Once spawned
//! it runs on a single task and is driven only through a [`TrackingHandle`],
//! so nothing else ever touches its state.
//!
//! ```text
//! Idle ──pending──▶ Pending ──status leaves pending──▶ Requesting
//! Idle ──otherwise──▶ Requesting
//! Requesting ──first sample──▶ Active (driver) | Monitoring (viewer)
//! Requesting ──permission refused──▶ Denied ──retry──▶ Requesting
//! Active/Monitoring ──poll fails──▶ Error ──next sample──▶ Active/Monitoring
//! any ──stop──▶ Inactive
//! ```
//!
//! Every await inside a poll races the session's cancellation token, and
//! results are only committed after re-checking it, so a stopped session
//! never mutates its history again.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Coordinate, LocationSample, ShipmentId, ShipmentStatus};
use crate::geo::distance_km;

use super::config::TrackingConfig;
use super::history::HistoryBuffer;
use super::provider::{LocationError, LocationProvider, LocationSink};

/// Depth of the command queue between a handle and its session.
const COMMAND_BUFFER: usize = 16;

/// Lifecycle state of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Pending,
    Requesting,
    Active,
    Monitoring,
    Denied,
    Error,
    Inactive,
}

impl SessionStatus {
    /// Whether the poll loop should read a position in this state.
    pub fn polls(&self) -> bool {
        matches!(
            self,
            SessionStatus::Requesting
                | SessionStatus::Active
                | SessionStatus::Monitoring
                | SessionStatus::Error
        )
    }
}

/// Whose position feed the session consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingRole {
    /// The driver's own device; accepted samples are pushed upstream.
    Driver,

    /// Backend-reported positions for someone watching the shipment.
    Viewer,
}

impl TrackingRole {
    /// Status once samples are flowing, so the UI can label provenance.
    fn live_status(&self) -> SessionStatus {
        match self {
            TrackingRole::Driver => SessionStatus::Active,
            TrackingRole::Viewer => SessionStatus::Monitoring,
        }
    }
}

/// Everything a UI needs to draw live tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingSnapshot {
    pub shipment_id: ShipmentId,
    pub role: TrackingRole,
    pub status: SessionStatus,
    pub last_sample: Option<LocationSample>,
    /// Breadcrumb trail, oldest first.
    pub trail: Vec<Coordinate>,
    pub live: bool,
    pub poll_interval_ms: u64,
    pub last_error: Option<String>,
}

/// Result of one poll attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A sample was appended to the history.
    Accepted,

    /// Driver role: the fix was too close to the previous one.
    Filtered,

    /// The provider has no position yet.
    NoFix,

    /// The session is not in a polling state.
    Skipped,

    /// The session was cancelled; nothing was committed.
    Cancelled,
}

#[derive(Debug)]
enum Command {
    SetLive(bool),
    UpdateStatus(ShipmentStatus),
    RetryPermission,
}

/// A command and the channel answered once it has been applied and the
/// resulting snapshot published.
#[derive(Debug)]
struct Envelope {
    command: Command,
    applied: oneshot::Sender<()>,
}

/// Error returned when commanding a session that has already stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tracking session has stopped")]
pub struct SessionClosed;

/// State machine for tracking a single shipment.
pub struct TrackingSession<P, S> {
    shipment_id: ShipmentId,
    role: TrackingRole,
    remote_status: ShipmentStatus,
    status: SessionStatus,
    last_sample: Option<LocationSample>,
    history: HistoryBuffer,
    live: bool,
    last_error: Option<String>,
    config: TrackingConfig,
    provider: P,
    sink: S,
    cancel: CancellationToken,
    snapshots: watch::Sender<TrackingSnapshot>,
}

impl<P: LocationProvider, S: LocationSink> TrackingSession<P, S> {
    /// Create an idle session. Nothing is read until [`start`](Self::start).
    pub fn new(
        shipment_id: ShipmentId,
        remote_status: ShipmentStatus,
        role: TrackingRole,
        provider: P,
        sink: S,
        config: TrackingConfig,
    ) -> Self {
        let history = HistoryBuffer::new(config.history_capacity);
        let initial = TrackingSnapshot {
            shipment_id: shipment_id.clone(),
            role,
            status: SessionStatus::Idle,
            last_sample: None,
            trail: Vec::new(),
            live: false,
            poll_interval_ms: 0,
            last_error: None,
        };
        let (snapshots, _) = watch::channel(initial);

        let session = Self {
            shipment_id,
            role,
            remote_status,
            status: SessionStatus::Idle,
            last_sample: None,
            history,
            live: false,
            last_error: None,
            config,
            provider,
            sink,
            cancel: CancellationToken::new(),
            snapshots,
        };
        session.publish();
        session
    }

    pub fn shipment_id(&self) -> &ShipmentId {
        &self.shipment_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_sample(&self) -> Option<&LocationSample> {
        self.last_sample.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that stops this session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<TrackingSnapshot> {
        self.snapshots.subscribe()
    }

    /// Current poll interval for this role and mode.
    pub fn poll_interval(&self) -> Duration {
        match (self.role, self.live) {
            (TrackingRole::Driver, _) => self.config.driver_interval(),
            (TrackingRole::Viewer, true) => self.config.live_interval(),
            (TrackingRole::Viewer, false) => self.config.viewer_interval(),
        }
    }

    /// Leave `Idle`: park in `Pending`, or try for a first position.
    pub async fn start(&mut self) -> SessionStatus {
        if self.status != SessionStatus::Idle || self.is_cancelled() {
            return self.status;
        }

        if self.remote_status.is_pending() {
            self.transition(SessionStatus::Pending);
        } else {
            self.transition(SessionStatus::Requesting);
            // Failures are recorded in the session status
            let _ = self.poll_once().await;
        }
        self.status
    }

    /// Make one attempt to read and apply a position.
    ///
    /// Failures move the session to `Denied` or `Error` and are returned so
    /// callers can inspect the kind; the run loop only logs them.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, LocationError> {
        if self.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }
        if !self.status.polls() {
            return Ok(PollOutcome::Skipped);
        }

        // A poll that outlives its interval is superseded by the next tick
        let deadline = self.poll_interval();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            r = tokio::time::timeout(deadline, self.provider.current_location()) => r,
        };

        if self.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }

        match result {
            Err(_) => self.fail(LocationError::Transient("location poll timed out".into())),
            Ok(Err(err)) => self.fail(err),
            Ok(Ok(None)) => {
                debug!(shipment = %self.shipment_id, "no position available yet");
                Ok(PollOutcome::NoFix)
            }
            Ok(Ok(Some(sample))) => Ok(self.accept(sample).await),
        }
    }

    /// Stop tracking: cancel in-flight work and release the history.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.history.clear();
        self.transition(SessionStatus::Inactive);
    }

    async fn accept(&mut self, sample: LocationSample) -> PollOutcome {
        if self.role == TrackingRole::Driver
            && let Some(prev) = &self.last_sample
        {
            let moved_m = distance_km(prev.coordinate, sample.coordinate) * 1000.0;
            if moved_m < self.config.min_movement_m {
                debug!(shipment = %self.shipment_id, moved_m, "ignoring fix below movement threshold");
                return PollOutcome::Filtered;
            }
        }

        self.history.push(sample);
        self.last_sample = Some(sample);
        self.last_error = None;
        self.status = self.role.live_status();
        self.publish();

        if self.role == TrackingRole::Driver {
            self.push_upstream(&sample).await;
        }

        PollOutcome::Accepted
    }

    /// Report a sample upstream. Failure never affects local state.
    async fn push_upstream(&self, sample: &LocationSample) {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            r = self.sink.push_location(&self.shipment_id, sample) => r,
        };

        if let Err(err) = result {
            warn!(shipment = %self.shipment_id, error = %err, "failed to push location upstream");
        }
    }

    fn fail(&mut self, err: LocationError) -> Result<PollOutcome, LocationError> {
        let next = match err {
            LocationError::PermissionDenied => SessionStatus::Denied,
            _ => SessionStatus::Error,
        };
        warn!(shipment = %self.shipment_id, kind = %err.kind(), error = %err, "location poll failed");

        self.last_error = Some(err.to_string());
        self.transition(next);
        Err(err)
    }

    /// Apply a command. Returns true when the poll schedule should restart.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::SetLive(live) => {
                if self.live == live {
                    return false;
                }
                self.live = live;
                info!(shipment = %self.shipment_id, live, "live tracking toggled");
                self.publish();
                true
            }
            Command::UpdateStatus(remote) => {
                let was_pending = self.remote_status.is_pending();
                self.remote_status = remote;

                // Only an explicit retry leaves Denied
                if matches!(self.status, SessionStatus::Denied | SessionStatus::Inactive) {
                    return false;
                }

                match (was_pending, self.remote_status.is_pending()) {
                    (true, false) if self.status == SessionStatus::Pending => {
                        self.transition(SessionStatus::Requesting);
                        true
                    }
                    (false, true) => {
                        self.transition(SessionStatus::Pending);
                        false
                    }
                    _ => false,
                }
            }
            Command::RetryPermission => {
                if self.status != SessionStatus::Denied {
                    return false;
                }
                self.last_error = None;
                if self.remote_status.is_pending() {
                    self.transition(SessionStatus::Pending);
                    return false;
                }
                self.transition(SessionStatus::Requesting);
                true
            }
        }
    }

    fn transition(&mut self, next: SessionStatus) {
        if self.status != next {
            debug!(shipment = %self.shipment_id, from = ?self.status, to = ?next, "tracking status changed");
            self.status = next;
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(TrackingSnapshot {
            shipment_id: self.shipment_id.clone(),
            role: self.role,
            status: self.status,
            last_sample: self.last_sample,
            trail: self.history.snapshot(),
            live: self.live,
            poll_interval_ms: self.poll_interval().as_millis() as u64,
            last_error: self.last_error.clone(),
        });
    }

    /// Drive the session until it is cancelled or its handle goes away.
    async fn run(mut self, mut commands: mpsc::Receiver<Envelope>) {
        let cancel = self.cancel.clone();
        self.start().await;

        let mut ticks = self.schedule(false);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                envelope = commands.recv() => match envelope {
                    Some(Envelope { command, applied }) => {
                        if self.handle(command) {
                            ticks = self.schedule(true);
                        }
                        // The sender may have given up waiting
                        let _ = applied.send(());
                    }
                    None => break,
                },
                _ = ticks.tick() => {
                    // Failures are logged and reflected in the status
                    let _ = self.poll_once().await;
                }
            }
        }

        self.stop();
        info!(shipment = %self.shipment_id, "tracking session stopped");
    }

    /// Build the poll schedule. The first tick fires immediately only when
    /// `poll_now` is set; otherwise it waits a full interval.
    fn schedule(&self, poll_now: bool) -> tokio::time::Interval {
        let period = self.poll_interval();
        let start = if poll_now {
            tokio::time::Instant::now()
        } else {
            tokio::time::Instant::now() + period
        };
        let mut ticks = tokio::time::interval_at(start, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticks
    }
}

impl<P, S> TrackingSession<P, S>
where
    P: LocationProvider + 'static,
    S: LocationSink + 'static,
{
    /// Move the session onto its own task and return the owning handle.
    pub fn spawn(self) -> TrackingHandle {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let shipment_id = self.shipment_id.clone();
        let cancel = self.cancel.clone();
        let snapshots = self.snapshots.subscribe();
        let task = tokio::spawn(self.run(rx));

        TrackingHandle {
            shipment_id,
            cancel,
            commands,
            snapshots,
            task: Some(task),
        }
    }
}

/// Owning handle to a running session.
///
/// Dropping the handle cancels the session.
pub struct TrackingHandle {
    shipment_id: ShipmentId,
    cancel: CancellationToken,
    commands: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<TrackingSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl TrackingHandle {
    pub fn shipment_id(&self) -> &ShipmentId {
        &self.shipment_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TrackingSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingSnapshot> {
        self.snapshots.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the session without waiting for its task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Switch between the normal and the tighter live-tracking interval.
    pub async fn set_live_tracking(&self, enabled: bool) -> Result<(), SessionClosed> {
        self.send(Command::SetLive(enabled)).await
    }

    /// Tell the session the shipment's remote status changed.
    pub async fn update_status(&self, status: ShipmentStatus) -> Result<(), SessionClosed> {
        self.send(Command::UpdateStatus(status)).await
    }

    /// Ask for location access again after a denial.
    pub async fn retry_permission(&self) -> Result<(), SessionClosed> {
        self.send(Command::RetryPermission).await
    }

    /// Stop the session and wait for its task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(shipment = %self.shipment_id, error = %err, "tracking task ended abnormally");
        }
    }

    async fn send(&self, command: Command) -> Result<(), SessionClosed> {
        if self.cancel.is_cancelled() {
            return Err(SessionClosed);
        }
        let (applied, done) = oneshot::channel();
        self.commands
            .send(Envelope { command, applied })
            .await
            .map_err(|_| SessionClosed)?;
        done.await.map_err(|_| SessionClosed)
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
