//! Debounced insight request scheduling.
//!
//! `SchedulerCore` is the state machine, driven by explicit instants so it can
//! be tested without a runtime. `spawn_scheduler` wraps it in a task that
//! listens for selection changes, fires requests and applies completions.
//!
//! At most one debounced request is outstanding. A quiet period that ends
//! while a request is in flight is held and fires once nothing is in flight.
//! Only a manual refresh may overlap an outstanding request. Each request
//! carries a monotonic sequence number and a completion older than the last
//! applied one is discarded.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::{InsightError, InsightGenerator, InsightReport, InsightRequest};
use crate::models::Selection;

/// Default quiet period before an automatic request fires (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: u64 = 3500;

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Lifecycle phase of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    /// Nothing pending; holds the last result, if any
    #[default]
    Idle,
    /// Quiet-period timer running
    Scheduled,
    /// At least one request outstanding
    InFlight,
    /// Last applied request failed
    IdleWithError,
}

/// Why a request was fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Debounce,
    Manual,
}

/// Permission to send one request, tagged with its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u64,
    pub trigger: Trigger,
}

/// Point-in-time view of the scheduler, published to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerSnapshot {
    pub phase: SchedulerPhase,
    pub loaded: bool,
    /// Result of the last applied request; cleared when that request failed
    pub result: Option<InsightReport>,
    /// Error marker of the last applied request
    pub error: Option<String>,
    pub requests_sent: u64,
    pub last_applied_seq: u64,
}

/// Outcome of one remote call.
pub type Outcome = Result<Option<InsightReport>, InsightError>;

/// Pure scheduler state machine.
#[derive(Debug, Clone)]
pub struct SchedulerCore {
    config: SchedulerConfig,
    loaded: bool,
    deadline: Option<Instant>,
    next_seq: u64,
    last_applied: u64,
    in_flight: usize,
    result: Option<InsightReport>,
    error: Option<String>,
}

impl SchedulerCore {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            loaded: false,
            deadline: None,
            next_seq: 0,
            last_applied: 0,
            in_flight: 0,
            result: None,
            error: None,
        }
    }

    /// Entities finished loading. Counts as the first change: the initial
    /// request is scheduled after one quiet period.
    pub fn mark_loaded(&mut self, now: Instant) {
        if !self.loaded {
            self.loaded = true;
            self.deadline = Some(now + self.config.debounce);
        }
    }

    /// The reconciled selection changed. Restarts the quiet period.
    ///
    /// Returns `false` (and does nothing) before the first load.
    pub fn selection_changed(&mut self, now: Instant) -> bool {
        if !self.loaded {
            return false;
        }
        self.deadline = Some(now + self.config.debounce);
        true
    }

    /// Fire the debounced request if its deadline has passed and nothing is
    /// in flight.
    pub fn poll_due(&mut self, now: Instant) -> Option<Ticket> {
        if self.in_flight > 0 {
            return None;
        }
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(self.issue(Trigger::Debounce))
            }
            _ => None,
        }
    }

    /// Manual refresh: cancel any pending timer and fire immediately.
    pub fn refresh(&mut self) -> Ticket {
        self.deadline = None;
        self.issue(Trigger::Manual)
    }

    fn issue(&mut self, trigger: Trigger) -> Ticket {
        self.next_seq += 1;
        self.in_flight += 1;
        Ticket {
            seq: self.next_seq,
            trigger,
        }
    }

    /// Apply a completion. Returns `false` when it was superseded by a newer
    /// request that already completed.
    pub fn complete(&mut self, seq: u64, outcome: Outcome) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if seq <= self.last_applied {
            tracing::debug!(seq, last_applied = self.last_applied, "discarding stale insight result");
            return false;
        }
        self.last_applied = seq;
        match outcome {
            Ok(report) => {
                self.result = report;
                self.error = None;
            }
            Err(err) => {
                self.result = None;
                self.error = Some(err.to_string());
            }
        }
        true
    }

    /// A request task ended without producing an outcome.
    pub fn abandon(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Instant the driver should wake for `poll_due`. `None` while a request
    /// is in flight; a held deadline comes back once it completes.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.in_flight > 0 {
            return None;
        }
        self.deadline
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.in_flight > 0 {
            SchedulerPhase::InFlight
        } else if self.deadline.is_some() {
            SchedulerPhase::Scheduled
        } else if self.error.is_some() {
            SchedulerPhase::IdleWithError
        } else {
            SchedulerPhase::Idle
        }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            phase: self.phase(),
            loaded: self.loaded,
            result: self.result.clone(),
            error: self.error.clone(),
            requests_sent: self.next_seq,
            last_applied_seq: self.last_applied,
        }
    }
}

enum Command {
    Loaded,
    Refresh,
    Flush(oneshot::Sender<SchedulerSnapshot>),
    Shutdown,
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SchedulerSnapshot>,
    task: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal that entities are loaded; automatic requests are enabled from here.
    pub async fn mark_loaded(&self) {
        let _ = self.commands.send(Command::Loaded).await;
    }

    /// Fire a request now with the latest selection.
    pub async fn refresh(&self) {
        let _ = self.commands.send(Command::Refresh).await;
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Snapshot taken after every selection change sent so far has been seen.
    pub async fn flush(&self) -> SchedulerSnapshot {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Flush(tx)).await.is_err() {
            return self.snapshot();
        }
        rx.await.unwrap_or_else(|_| self.snapshot())
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the scheduler. Outstanding requests are dropped.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Spawn the scheduler loop on the current runtime.
///
/// The selection is read from `selection_rx` when a request fires, so a
/// request always carries the latest reconciled selection.
pub fn spawn_scheduler(
    generator: Arc<dyn InsightGenerator>,
    selection_rx: watch::Receiver<Selection>,
    config: SchedulerConfig,
) -> SchedulerHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (snapshot_tx, snapshot_rx) = watch::channel(SchedulerSnapshot::default());
    let task = tokio::spawn(run(generator, selection_rx, command_rx, snapshot_tx, config));
    SchedulerHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        task,
    }
}

async fn run(
    generator: Arc<dyn InsightGenerator>,
    mut selection_rx: watch::Receiver<Selection>,
    mut commands: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<SchedulerSnapshot>,
    config: SchedulerConfig,
) {
    let mut core = SchedulerCore::new(config);
    let mut requests: JoinSet<(u64, Outcome)> = JoinSet::new();
    let mut selection_open = true;

    loop {
        let deadline = core.next_deadline();

        tokio::select! {
            biased;

            // Selection changes go first so a refresh or flush queued after an
            // edit observes that edit.
            changed = selection_rx.changed(), if selection_open => {
                if changed.is_err() {
                    selection_open = false;
                } else if core.selection_changed(Instant::now()) {
                    tracing::debug!(debounce_ms = config.debounce.as_millis() as u64, "insight request scheduled");
                }
            }
            command = commands.recv() => match command {
                Some(Command::Loaded) => core.mark_loaded(Instant::now()),
                Some(Command::Refresh) => {
                    let ticket = core.refresh();
                    fire(&mut requests, &generator, &selection_rx, ticket);
                }
                Some(Command::Flush(reply)) => {
                    let _ = reply.send(core.snapshot());
                }
                Some(Command::Shutdown) | None => break,
            },
            Some(joined) = requests.join_next(), if !requests.is_empty() => match joined {
                Ok((seq, outcome)) => {
                    if let Err(err) = &outcome {
                        tracing::warn!(seq, error = %err, "insight request failed");
                    }
                    core.complete(seq, outcome);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "insight request task ended abnormally");
                    core.abandon();
                }
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(ticket) = core.poll_due(Instant::now()) {
                    fire(&mut requests, &generator, &selection_rx, ticket);
                }
            }
        }

        let snapshot = core.snapshot();
        snapshot_tx.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    requests.abort_all();
}

fn fire(
    requests: &mut JoinSet<(u64, Outcome)>,
    generator: &Arc<dyn InsightGenerator>,
    selection_rx: &watch::Receiver<Selection>,
    ticket: Ticket,
) {
    let request = InsightRequest::from(&*selection_rx.borrow());
    tracing::info!(
        seq = ticket.seq,
        trigger = ?ticket.trigger,
        projects = request.project_ids.len(),
        "sending insight request"
    );
    let generator = Arc::clone(generator);
    requests.spawn(async move {
        let outcome = generator.generate(&request).await;
        (ticket.seq, outcome)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::InsightSection;

    fn core() -> SchedulerCore {
        SchedulerCore::new(SchedulerConfig::default())
    }

    fn report(summary: &str) -> Option<InsightReport> {
        Some(InsightReport {
            overview: InsightSection {
                summary: Some(summary.to_string()),
                bullets: Vec::new(),
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_changes_before_load_are_ignored() {
        let mut core = core();
        let t0 = Instant::now();
        assert!(!core.selection_changed(t0));
        assert_eq!(core.phase(), SchedulerPhase::Idle);
        assert_eq!(core.poll_due(t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_debounce_collapses_burst_into_one_fire() {
        let mut core = core();
        let t0 = Instant::now();
        core.mark_loaded(t0);
        core.selection_changed(t0);
        core.selection_changed(t0 + Duration::from_secs(1));
        core.selection_changed(t0 + Duration::from_secs(2));
        assert_eq!(core.phase(), SchedulerPhase::Scheduled);

        assert_eq!(core.poll_due(t0 + Duration::from_millis(5499)), None);
        let ticket = core.poll_due(t0 + Duration::from_millis(5500)).unwrap();
        assert_eq!(ticket.seq, 1);
        assert_eq!(ticket.trigger, Trigger::Debounce);
        assert_eq!(core.phase(), SchedulerPhase::InFlight);
        assert_eq!(core.poll_due(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_refresh_cancels_pending_timer() {
        let mut core = core();
        let t0 = Instant::now();
        core.mark_loaded(t0);
        core.selection_changed(t0);

        let ticket = core.refresh();
        assert_eq!(ticket.trigger, Trigger::Manual);
        assert_eq!(core.next_deadline(), None);
        assert_eq!(core.poll_due(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut core = core();
        core.mark_loaded(Instant::now());
        let first = core.refresh();
        let second = core.refresh();

        assert!(core.complete(second.seq, Ok(report("new"))));
        assert!(!core.complete(first.seq, Ok(report("old"))));

        let snapshot = core.snapshot();
        assert_eq!(snapshot.result, report("new"));
        assert_eq!(snapshot.last_applied_seq, 2);
        assert_eq!(snapshot.phase, SchedulerPhase::Idle);
    }

    #[test]
    fn test_failure_clears_result_and_sets_error() {
        let mut core = core();
        core.mark_loaded(Instant::now());
        let ok = core.refresh();
        core.complete(ok.seq, Ok(report("first")));

        let failing = core.refresh();
        core.complete(failing.seq, Err(InsightError::Timeout));

        let snapshot = core.snapshot();
        assert_eq!(snapshot.phase, SchedulerPhase::IdleWithError);
        assert_eq!(snapshot.result, None);
        assert_eq!(snapshot.error.as_deref(), Some("Insight request timed out"));
    }

    #[test]
    fn test_success_after_error_returns_to_idle() {
        let mut core = core();
        core.mark_loaded(Instant::now());
        let failing = core.refresh();
        core.complete(failing.seq, Err(InsightError::Forbidden));
        let ok = core.refresh();
        core.complete(ok.seq, Ok(None));

        let snapshot = core.snapshot();
        assert_eq!(snapshot.phase, SchedulerPhase::Idle);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.result, None);
    }

    #[test]
    fn test_change_during_flight_schedules_again() {
        let mut core = core();
        let t0 = Instant::now();
        core.mark_loaded(t0);
        let ticket = core.poll_due(t0 + Duration::from_millis(3500)).unwrap();
        core.selection_changed(t0 + Duration::from_secs(4));
        assert_eq!(core.phase(), SchedulerPhase::InFlight);

        core.complete(ticket.seq, Ok(None));
        assert_eq!(core.phase(), SchedulerPhase::Scheduled);
        assert!(core.poll_due(t0 + Duration::from_millis(7500)).is_some());
    }

    #[test]
    fn test_quiet_period_ending_mid_flight_is_held() {
        let mut core = core();
        let t0 = Instant::now();
        core.mark_loaded(t0);
        let first = core.poll_due(t0 + Duration::from_millis(3500)).unwrap();
        core.selection_changed(t0 + Duration::from_millis(3600));

        assert_eq!(core.poll_due(t0 + Duration::from_secs(8)), None);
        assert_eq!(core.next_deadline(), None);
        assert_eq!(core.phase(), SchedulerPhase::InFlight);

        core.complete(first.seq, Ok(None));
        assert_eq!(core.next_deadline(), Some(t0 + Duration::from_millis(7100)));
        let second = core.poll_due(t0 + Duration::from_millis(13500)).unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.trigger, Trigger::Debounce);
    }

    #[test]
    fn test_held_deadline_released_by_abandon() {
        let mut core = core();
        let t0 = Instant::now();
        core.mark_loaded(t0);
        core.poll_due(t0 + Duration::from_millis(3500)).unwrap();
        core.selection_changed(t0 + Duration::from_secs(4));
        assert_eq!(core.poll_due(t0 + Duration::from_secs(9)), None);

        core.abandon();
        assert!(core.poll_due(t0 + Duration::from_secs(9)).is_some());
    }

    #[test]
    fn test_refresh_may_overlap_in_flight_request() {
        let mut core = core();
        let t0 = Instant::now();
        core.mark_loaded(t0);
        let first = core.poll_due(t0 + Duration::from_millis(3500)).unwrap();
        let second = core.refresh();
        assert_eq!(second.seq, first.seq + 1);
        assert_eq!(core.snapshot().requests_sent, 2);
    }
}
