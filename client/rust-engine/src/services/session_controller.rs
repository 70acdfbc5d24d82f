use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::api::{ApiError, ExamApi};
use crate::config::Config;
use crate::error::{LoadError, SubmitError};
use crate::metrics::{
    AUTOSAVE_FLUSHES_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL, SUBMISSIONS_TOTAL, SYNC_POLLS_TOTAL,
    TIMER_EXPIRIES_TOTAL, UNSAVED_RISK_SUBMISSIONS_TOTAL,
};
use crate::models::timer::{TimeExpired, TimerEvent, TimerTick};
use crate::models::{AnswerPatch, RemainingTime};
use crate::services::answer_buffer::{AnswerBuffer, PendingAnswer};
use crate::services::autosave::{AutosavePublisher, SaveState};
use crate::services::local_clock::LocalClock;
use crate::services::server_sync::{ServerTimeSync, SyncOutcome};
use crate::services::submission_gate::{GateDecision, SubmissionGate, SubmitMode, SubmitOutcome};
use crate::services::task_catalog::TaskCatalog;
use crate::utils::retry::{retry_transient, RetryConfig};
use crate::utils::time::until_deadline;

/// Session lifecycle. There is no transition out of a terminal state;
/// `ViewOnly` is entered directly from `Loading` when the remote record is
/// already closed, and `SubmissionPending` marks a failed automatic
/// submission awaiting reconciliation by the next sync poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    Loading,
    Active,
    Submitting { mode: SubmitMode },
    SubmissionPending,
    Submitted,
    Expired,
    ViewOnly,
}

impl Lifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Lifecycle::Submitted | Lifecycle::Expired | Lifecycle::ViewOnly
        )
    }

    pub fn accepts_edits(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskIndicator {
    pub task_number: u32,
    pub answered: bool,
    pub flagged: bool,
}

/// Read-only view of the session published to the presentation layer after
/// every state change.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub lifecycle: Lifecycle,
    /// Server-corrected display value; expiry itself always follows the
    /// local deadline.
    pub remaining_seconds: u32,
    pub answered_count: u32,
    pub flagged_count: u32,
    pub task_count: u32,
    pub tasks: Vec<TaskIndicator>,
    pub save_state: SaveState,
    pub unsaved_risk: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Loading,
            remaining_seconds: 0,
            answered_count: 0,
            flagged_count: 0,
            task_count: 0,
            tasks: Vec::new(),
            save_state: SaveState::Saved,
            unsaved_risk: false,
        }
    }
}

enum Command {
    SetAnswer {
        task_number: u32,
        value: String,
    },
    ToggleFlag {
        task_number: u32,
    },
    Submit {
        mode: SubmitMode,
        reply: oneshot::Sender<Result<SubmitOutcome, SubmitError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Completions of spawned network calls, fed back into the session loop so
/// all state stays owned by one task.
enum IoEvent {
    FlushDone {
        result: Result<(), ApiError>,
    },
    SubmitDone {
        mode: SubmitMode,
        result: Result<(), ApiError>,
        flush_ok: bool,
        unsaved_risk: bool,
    },
    SyncDone {
        result: Result<RemainingTime, ApiError>,
    },
}

/// Handle to a running exam session.
///
/// All mutation is forwarded to the session's event loop; dropping the
/// handle stops the loop after a best-effort flush of unsaved answers.
#[derive(Debug)]
pub struct ExamSession {
    cmd_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<TimerEvent>,
    catalog: Arc<TaskCatalog>,
    loop_task: JoinHandle<()>,
}

impl ExamSession {
    /// Fetches the attempt and its variant, activating the attempt if it
    /// has not started yet, and spawns the session loop.
    ///
    /// Any failure here is terminal: the session cannot exist without its
    /// data.
    pub async fn load(
        api: Arc<dyn ExamApi>,
        attempt_id: &str,
        config: &Config,
    ) -> Result<Self, LoadError> {
        tracing::info!("Loading attempt {}", attempt_id);

        let attempt = retry_transient(RetryConfig::default(), || api.get_attempt(attempt_id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => LoadError::AttemptUnavailable(attempt_id.to_string()),
                other => LoadError::Api(other),
            })?;

        // Activation is idempotent server-side: an already-started attempt
        // keeps its original deadline.
        let attempt = if attempt.started_at.is_none() {
            tracing::info!("Activating attempt {}", attempt_id);
            retry_transient(RetryConfig::default(), || api.start_attempt(attempt_id))
                .await
                .map_err(|e| match e {
                    ApiError::NotFound(_) => LoadError::AttemptUnavailable(attempt_id.to_string()),
                    other => LoadError::Api(other),
                })?
        } else {
            attempt
        };

        let variant_id = attempt.variant_id.clone();
        let tasks = retry_transient(RetryConfig::default(), || api.get_variant_tasks(&variant_id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => LoadError::VariantUnavailable(variant_id.clone()),
                other => LoadError::Api(other),
            })?;
        let catalog = Arc::new(TaskCatalog::new(tasks));

        let mut buffer = AnswerBuffer::new();
        if let Some(submission) = &attempt.submission {
            catalog.restore_answers(submission, &mut buffer);
        }

        let view_only = attempt.is_closed();
        let clock = if view_only {
            None
        } else {
            let deadline = attempt
                .deadline_at
                .ok_or_else(|| LoadError::MissingDeadline(attempt_id.to_string()))?;
            Some(LocalClock::from_remaining(until_deadline(
                deadline,
                Utc::now(),
            )))
        };

        let lifecycle = if view_only {
            Lifecycle::ViewOnly
        } else {
            Lifecycle::Active
        };
        let outcome_label = if view_only { "view_only" } else { "active" };
        SESSIONS_TOTAL.with_label_values(&[outcome_label]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!(
            "Attempt {} loaded as {:?} with {} task(s), {} restored answer(s)",
            attempt_id,
            lifecycle,
            catalog.len(),
            buffer.answered_count()
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (io_tx, io_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let core = SessionCore {
            attempt_id: attempt.id.clone(),
            submission_id: attempt.submission.as_ref().map(|s| s.id.clone()),
            api,
            catalog: catalog.clone(),
            buffer,
            autosave: AutosavePublisher::new(config.autosave_debounce()),
            clock,
            sync: ServerTimeSync::new(),
            gate: SubmissionGate::new(),
            lifecycle,
            flagged: BTreeSet::new(),
            unsaved_risk: false,
            pending_submit: None,
            submit_batch: Vec::new(),
            submit_waiters: Vec::new(),
            sync_in_flight: false,
            tick_interval: config.tick_interval(),
            sync_interval: config.sync_interval(),
            io_tx,
            snapshot_tx,
            events: events_tx.clone(),
        };
        core.publish_snapshot();

        let loop_task = tokio::spawn(core.run(cmd_rx, io_rx));

        Ok(Self {
            cmd_tx,
            snapshot_rx,
            events: events_tx,
            catalog,
            loop_task,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Countdown events for the presentation layer. `TimeExpired` is
    /// delivered at most once per session.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Routes an edit to the answer buffer. Silently ignored from
    /// Submitting onward.
    pub fn set_answer(&self, task_number: u32, value: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::SetAnswer {
            task_number,
            value: value.into(),
        });
    }

    /// Purely local bookkeeping; never persisted, reset by a reload.
    pub fn toggle_flag(&self, task_number: u32) {
        let _ = self.cmd_tx.send(Command::ToggleFlag { task_number });
    }

    /// Requests the terminal submission. At most one submission call ever
    /// reaches the server; concurrent and repeated calls all receive the
    /// outcome of the first.
    pub async fn submit(&self, mode: SubmitMode) -> Result<SubmitOutcome, SubmitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit {
                mode,
                reply: reply_tx,
            })
            .map_err(|_| SubmitError::Shutdown)?;
        reply_rx.await.map_err(|_| SubmitError::Shutdown)?
    }

    /// Tears the session down: best-effort flush of dirty answers, then a
    /// deterministic stop of all timers; no callback fires afterwards.
    pub async fn close(self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Close { reply: reply_tx })
            .is_ok()
        {
            let _ = reply_rx.await;
        }
        let _ = self.loop_task.await;
    }
}

struct SessionCore {
    attempt_id: String,
    submission_id: Option<String>,
    api: Arc<dyn ExamApi>,
    catalog: Arc<TaskCatalog>,
    buffer: AnswerBuffer,
    autosave: AutosavePublisher,
    clock: Option<LocalClock>,
    sync: ServerTimeSync,
    gate: SubmissionGate,
    lifecycle: Lifecycle,
    flagged: BTreeSet<u32>,
    unsaved_risk: bool,
    /// Set when submission was requested while a flush was in flight; the
    /// gate waits for that flush's outcome before issuing the submit call.
    pending_submit: Option<SubmitMode>,
    submit_batch: Vec<PendingAnswer>,
    submit_waiters: Vec<oneshot::Sender<Result<SubmitOutcome, SubmitError>>>,
    sync_in_flight: bool,
    tick_interval: Duration,
    sync_interval: Duration,
    io_tx: mpsc::UnboundedSender<IoEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<TimerEvent>,
}

impl SessionCore {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut io_rx: mpsc::UnboundedReceiver<IoEvent>,
    ) {
        let mut tick = interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first sync poll is due one full period in, not at start.
        let mut sync_tick = interval_at(Instant::now() + self.sync_interval, self.sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let flush_at = self.autosave.flush_deadline();

            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    let done = match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            // Handle dropped without an explicit close.
                            self.teardown_flush().await;
                            true
                        }
                    };
                    if done {
                        break;
                    }
                }

                Some(event) = io_rx.recv() => self.handle_io(event),

                _ = sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                    self.start_flush();
                }

                _ = tick.tick(), if self.ticking() => self.on_tick(),

                _ = sync_tick.tick(), if self.sync_enabled() => self.start_sync_poll(),
            }
        }

        SESSIONS_ACTIVE.dec();
        tracing::info!("Session loop for attempt {} stopped", self.attempt_id);
    }

    fn ticking(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active)
    }

    fn sync_enabled(&self) -> bool {
        !self.sync_in_flight
            && matches!(
                self.lifecycle,
                Lifecycle::Active | Lifecycle::SubmissionPending
            )
    }

    /// Returns `true` when the loop should stop.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::SetAnswer { task_number, value } => {
                self.on_set_answer(task_number, value);
                false
            }
            Command::ToggleFlag { task_number } => {
                self.on_toggle_flag(task_number);
                false
            }
            Command::Submit { mode, reply } => {
                self.request_submit(mode, Some(reply));
                false
            }
            Command::Close { reply } => {
                self.teardown_flush().await;
                let _ = reply.send(());
                true
            }
        }
    }

    fn handle_io(&mut self, event: IoEvent) {
        match event {
            IoEvent::FlushDone { result } => self.on_flush_done(result),
            IoEvent::SubmitDone {
                mode,
                result,
                flush_ok,
                unsaved_risk,
            } => self.on_submit_done(mode, result, flush_ok, unsaved_risk),
            IoEvent::SyncDone { result } => self.on_sync_done(result),
        }
    }

    fn on_set_answer(&mut self, task_number: u32, value: String) {
        if !self.lifecycle.accepts_edits() {
            tracing::debug!(
                "Ignoring edit for task {} in {:?}",
                task_number,
                self.lifecycle
            );
            return;
        }
        if !self.catalog.contains(task_number) {
            tracing::warn!("Ignoring edit for unknown task {}", task_number);
            return;
        }

        self.buffer.set(task_number, value);
        self.autosave.note_edit();
        self.publish_snapshot();
    }

    fn on_toggle_flag(&mut self, task_number: u32) {
        if self.lifecycle.is_terminal() || !self.catalog.contains(task_number) {
            return;
        }
        if !self.flagged.remove(&task_number) {
            self.flagged.insert(task_number);
        }
        self.publish_snapshot();
    }

    fn on_tick(&mut self) {
        let Some(clock) = self.clock.as_mut() else {
            return;
        };

        let remaining = clock.remaining_seconds();
        let display = self.sync.corrected(remaining);
        let _ = self.events.send(TimerEvent::TimerTick(TimerTick {
            attempt_id: self.attempt_id.clone(),
            remaining_seconds: display,
            elapsed_seconds: clock.elapsed_seconds(),
            total_seconds: clock.total_seconds(),
            timestamp: Utc::now(),
        }));

        let expired = clock.poll_expiry();
        self.publish_snapshot();

        if expired {
            TIMER_EXPIRIES_TOTAL.inc();
            tracing::info!(
                "Deadline reached for attempt {}, auto-submitting",
                self.attempt_id
            );
            let _ = self.events.send(TimerEvent::TimeExpired(TimeExpired {
                attempt_id: self.attempt_id.clone(),
                timestamp: Utc::now(),
                message: "Time limit exceeded".to_string(),
            }));
            self.request_submit(SubmitMode::Auto, None);
        }
    }

    fn request_submit(
        &mut self,
        mode: SubmitMode,
        reply: Option<oneshot::Sender<Result<SubmitOutcome, SubmitError>>>,
    ) {
        if matches!(self.lifecycle, Lifecycle::ViewOnly | Lifecycle::Loading) {
            if let Some(reply) = reply {
                let _ = reply.send(Err(SubmitError::NotActive));
            }
            return;
        }

        // The latch is checked and set before any await point; concurrent
        // manual and auto triggers serialize here.
        match self.gate.request(mode) {
            GateDecision::Settled(outcome) => {
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            GateDecision::InFlight => {
                if let Some(reply) = reply {
                    self.submit_waiters.push(reply);
                }
            }
            GateDecision::Acquired(mode) => {
                if let Some(reply) = reply {
                    self.submit_waiters.push(reply);
                }
                tracing::info!(
                    "Submission requested for attempt {} ({})",
                    self.attempt_id,
                    mode.as_str()
                );
                self.lifecycle = Lifecycle::Submitting { mode };
                self.autosave.disarm();
                self.publish_snapshot();

                if self.autosave.in_flight() {
                    // Wait for the running flush to settle first; its
                    // outcome decides what still needs a final flush.
                    self.pending_submit = Some(mode);
                } else {
                    self.begin_submission(mode);
                }
            }
        }
    }

    fn begin_submission(&mut self, mode: SubmitMode) {
        let batch = self.buffer.snapshot_dirty();
        self.submit_batch = batch.clone();

        let api = self.api.clone();
        let io_tx = self.io_tx.clone();
        let attempt_id = self.attempt_id.clone();
        let submission_id = self.submission_id.clone();
        let writes_allowed = !self.autosave.is_disabled();

        tokio::spawn(async move {
            let mut unsaved_risk = false;
            let mut flush_ok = false;

            if !batch.is_empty() {
                match (&submission_id, writes_allowed) {
                    (Some(submission_id), true) => {
                        let patches: Vec<AnswerPatch> =
                            batch.iter().map(PendingAnswer::to_patch).collect();
                        match api.patch_answers(submission_id, &patches).await {
                            Ok(()) => flush_ok = true,
                            Err(e) => {
                                // Partial-answer submission beats never
                                // submitting, especially on expiry.
                                tracing::warn!("Pre-submit flush failed: {}", e);
                                unsaved_risk = true;
                            }
                        }
                    }
                    _ => unsaved_risk = true,
                }
            }

            let result = match (mode, &submission_id) {
                (SubmitMode::Manual, Some(submission_id)) => {
                    api.submit_attempt(submission_id).await
                }
                _ => api.force_submit_attempt(&attempt_id).await,
            };

            let _ = io_tx.send(IoEvent::SubmitDone {
                mode,
                result,
                flush_ok,
                unsaved_risk,
            });
        });
    }

    fn on_submit_done(
        &mut self,
        mode: SubmitMode,
        result: Result<(), ApiError>,
        flush_ok: bool,
        unsaved_risk: bool,
    ) {
        if !self.gate.is_latched() {
            // A sync poll absorbed the server-side closure while our own
            // call was in flight; the gate already settled.
            tracing::debug!("Ignoring submission outcome after absorption");
            return;
        }

        let batch = std::mem::take(&mut self.submit_batch);
        if flush_ok {
            self.buffer.acknowledge(&batch);
        }

        match result {
            Ok(()) => {
                if unsaved_risk {
                    UNSAVED_RISK_SUBMISSIONS_TOTAL.inc();
                    self.unsaved_risk = true;
                }
                SUBMISSIONS_TOTAL
                    .with_label_values(&[mode.as_str(), "success"])
                    .inc();
                self.lifecycle = match mode {
                    SubmitMode::Manual => Lifecycle::Submitted,
                    SubmitMode::Auto => Lifecycle::Expired,
                };
                tracing::info!(
                    "Attempt {} submitted ({}), unsaved_risk={}",
                    self.attempt_id,
                    mode.as_str(),
                    unsaved_risk
                );
                let outcome = SubmitOutcome {
                    mode,
                    unsaved_risk,
                    absorbed: false,
                };
                self.gate.settle(Ok(outcome.clone()));
                self.resolve_waiters(Ok(outcome));
            }
            Err(e) => {
                SUBMISSIONS_TOTAL
                    .with_label_values(&[mode.as_str(), "error"])
                    .inc();
                tracing::error!("Submission failed for attempt {}: {}", self.attempt_id, e);
                let err = SubmitError::Api(e);
                match mode {
                    SubmitMode::Manual => {
                        // Reopen for an explicit retry by the learner.
                        self.gate.release();
                        self.lifecycle = Lifecycle::Active;
                    }
                    SubmitMode::Auto => {
                        // No automatic retry: duplicate terminal effects are
                        // worse. The next sync poll reconciles truth.
                        self.gate.settle(Err(err.clone()));
                        self.lifecycle = Lifecycle::SubmissionPending;
                    }
                }
                self.resolve_waiters(Err(err));
            }
        }
        self.publish_snapshot();
    }

    fn start_flush(&mut self) {
        if self.autosave.in_flight() || self.autosave.is_disabled() {
            return;
        }
        let Some(submission_id) = self.submission_id.clone() else {
            tracing::warn!(
                "No submission record for attempt {}; autosave disabled",
                self.attempt_id
            );
            self.autosave.disable();
            return;
        };

        let batch = self.buffer.snapshot_dirty();
        if batch.is_empty() {
            self.autosave.disarm();
            return;
        }

        self.autosave.begin_flush(batch.clone());
        self.publish_snapshot();

        let api = self.api.clone();
        let io_tx = self.io_tx.clone();
        tokio::spawn(async move {
            let patches: Vec<AnswerPatch> = batch.iter().map(PendingAnswer::to_patch).collect();
            let result = api.patch_answers(&submission_id, &patches).await;
            let _ = io_tx.send(IoEvent::FlushDone { result });
        });
    }

    fn on_flush_done(&mut self, result: Result<(), ApiError>) {
        let ok = result.is_ok();
        let batch = self.autosave.complete_flush(ok);

        match result {
            Ok(()) => {
                self.buffer.acknowledge(&batch);
                AUTOSAVE_FLUSHES_TOTAL.with_label_values(&["success"]).inc();
                tracing::debug!("Flushed {} answer(s)", batch.len());
            }
            Err(e) => {
                AUTOSAVE_FLUSHES_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!("Autosave flush failed, entries stay dirty: {}", e);
                if matches!(e, ApiError::SubmissionClosed) {
                    // The record closed under us; stop writing and
                    // reconcile now instead of waiting out the interval.
                    self.autosave.disable();
                    self.start_sync_poll();
                }
            }
        }

        if let Some(mode) = self.pending_submit.take() {
            if self.gate.is_latched() {
                self.begin_submission(mode);
            }
        }
        self.publish_snapshot();
    }

    fn start_sync_poll(&mut self) {
        if self.sync_in_flight {
            return;
        }
        self.sync_in_flight = true;

        let api = self.api.clone();
        let io_tx = self.io_tx.clone();
        let attempt_id = self.attempt_id.clone();
        tokio::spawn(async move {
            let result = api.get_remaining_time(&attempt_id).await;
            let _ = io_tx.send(IoEvent::SyncDone { result });
        });
    }

    fn on_sync_done(&mut self, result: Result<RemainingTime, ApiError>) {
        self.sync_in_flight = false;

        match result {
            Ok(remaining) => {
                let local = self
                    .clock
                    .as_ref()
                    .map(LocalClock::remaining_seconds)
                    .unwrap_or(0);
                match self.sync.observe(&remaining, local) {
                    SyncOutcome::Closed => {
                        SYNC_POLLS_TOTAL.with_label_values(&["absorbed"]).inc();
                        self.absorb_remote_closure();
                    }
                    SyncOutcome::Corrected => {
                        SYNC_POLLS_TOTAL.with_label_values(&["success"]).inc();
                        self.publish_snapshot();
                    }
                }
            }
            Err(e) => {
                // Never interrupts the timer or blocks answering.
                SYNC_POLLS_TOTAL.with_label_values(&["error"]).inc();
                tracing::debug!("Time sync failed (ignored): {}", e);
            }
        }
    }

    /// The server closed the attempt itself. Absorbed as the terminal
    /// state; no submit call of our own is issued.
    fn absorb_remote_closure(&mut self) {
        if self.lifecycle.is_terminal() {
            return;
        }
        let unsaved_risk = self.buffer.dirty_count() > 0;
        tracing::info!(
            "Attempt {} was closed server-side; absorbing (unsaved_risk={})",
            self.attempt_id,
            unsaved_risk
        );
        if unsaved_risk {
            self.unsaved_risk = true;
        }

        let outcome = SubmitOutcome {
            mode: SubmitMode::Auto,
            unsaved_risk,
            absorbed: true,
        };
        self.gate.absorb(outcome.clone());
        self.lifecycle = Lifecycle::Expired;
        self.autosave.disable();
        self.resolve_waiters(Ok(outcome));
        self.publish_snapshot();
    }

    async fn teardown_flush(&mut self) {
        if !matches!(self.lifecycle, Lifecycle::Active) || self.autosave.is_disabled() {
            return;
        }
        let Some(submission_id) = self.submission_id.clone() else {
            return;
        };
        let batch = self.buffer.snapshot_dirty();
        if batch.is_empty() {
            return;
        }

        tracing::info!(
            "Final flush of {} dirty answer(s) on teardown of attempt {}",
            batch.len(),
            self.attempt_id
        );
        let patches: Vec<AnswerPatch> = batch.iter().map(PendingAnswer::to_patch).collect();
        match self.api.patch_answers(&submission_id, &patches).await {
            Ok(()) => {
                self.buffer.acknowledge(&batch);
                AUTOSAVE_FLUSHES_TOTAL.with_label_values(&["success"]).inc();
            }
            Err(e) => {
                AUTOSAVE_FLUSHES_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!("Teardown flush failed: {}", e);
            }
        }
    }

    fn resolve_waiters(&mut self, outcome: Result<SubmitOutcome, SubmitError>) {
        for waiter in self.submit_waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn publish_snapshot(&self) {
        let remaining = self
            .clock
            .as_ref()
            .map(|c| self.sync.corrected(c.remaining_seconds()))
            .unwrap_or(0);

        let tasks: Vec<TaskIndicator> = self
            .catalog
            .tasks()
            .iter()
            .map(|t| TaskIndicator {
                task_number: t.task_number,
                answered: self.buffer.is_answered(t.task_number),
                flagged: self.flagged.contains(&t.task_number),
            })
            .collect();

        let _ = self.snapshot_tx.send(SessionSnapshot {
            lifecycle: self.lifecycle,
            remaining_seconds: remaining,
            answered_count: self.buffer.answered_count(),
            flagged_count: self.flagged.len() as u32,
            task_count: self.catalog.len() as u32,
            tasks,
            save_state: self.autosave.state(),
            unsaved_risk: self.unsaved_risk,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_recognized() {
        assert!(Lifecycle::Submitted.is_terminal());
        assert!(Lifecycle::Expired.is_terminal());
        assert!(Lifecycle::ViewOnly.is_terminal());
        assert!(!Lifecycle::Active.is_terminal());
        assert!(!Lifecycle::Submitting {
            mode: SubmitMode::Auto
        }
        .is_terminal());
        assert!(!Lifecycle::SubmissionPending.is_terminal());
    }

    #[test]
    fn only_active_accepts_edits() {
        assert!(Lifecycle::Active.accepts_edits());
        assert!(!Lifecycle::Submitting {
            mode: SubmitMode::Manual
        }
        .accepts_edits());
        assert!(!Lifecycle::SubmissionPending.accepts_edits());
        assert!(!Lifecycle::ViewOnly.accepts_edits());
    }
}
