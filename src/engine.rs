//! The single logical thread that owns the roster and the scan gate.
//!
//! HTTP handlers, the refresh scheduler and the capture session never touch
//! roster or gate state directly. They send `Command`s (or decode events) and
//! the engine processes them one at a time, in arrival order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::capture::{ChannelEpoch, DECODE_CHANNEL_CAPACITY, DecodeEvent, DecodeKind};
use crate::config::GateConfig;
use crate::errors::AppError;
use crate::gate::{GateTick, ScanDecision, ScanGate, ScanOutcome, countdown_secs};
use crate::live::{LiveEvent, LiveHub};
use crate::roster::loader::RosterSource;
use crate::roster::parse::ParsedRoster;
use crate::roster::{RosterStore, SnapshotEntry, Stats};
use crate::session::SessionStore;

const COMMAND_CAPACITY: usize = 64;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

pub enum Command {
    ReplaceRoster {
        roster: ParsedRoster,
        source: RosterSource,
        reply: oneshot::Sender<Stats>,
    },
    Scan {
        raw: String,
        reply: oneshot::Sender<ScanDecision>,
    },
    Reset {
        reply: oneshot::Sender<Result<Stats, AppError>>,
    },
    Status {
        reply: oneshot::Sender<StatusView>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<SnapshotEntry>>,
    },
    /// A load or camera failure the operator should see.
    Surface { kind: &'static str, message: String },
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub stats: Stats,
    pub locked: bool,
    pub lock_remaining_secs: Option<i64>,
    pub failed_attempts: u32,
    pub last_outcome: Option<ScanOutcome>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub roster_source: Option<RosterSource>,
    pub duplicates: usize,
    pub last_error: Option<String>,
    pub session_id: String,
}

/// Cheap cloneable front door to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| AppError::EngineClosed)?;
        rx.await.map_err(|_| AppError::EngineClosed)
    }

    pub async fn replace_roster(&self, roster: ParsedRoster, source: RosterSource) -> Result<Stats, AppError> {
        self.request(|reply| Command::ReplaceRoster { roster, source, reply }).await
    }

    /// Run a payload through the gate directly (manual entry).
    pub async fn scan(&self, raw: impl Into<String>) -> Result<ScanDecision, AppError> {
        let raw = raw.into();
        self.request(|reply| Command::Scan { raw, reply }).await
    }

    pub async fn reset(&self) -> Result<Stats, AppError> {
        self.request(|reply| Command::Reset { reply }).await?
    }

    pub async fn status(&self) -> Result<StatusView, AppError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Vec<SnapshotEntry>, AppError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn surface(&self, error: &AppError) -> Result<(), AppError> {
        let (kind, message) = (error.kind(), error.to_string());
        self.commands
            .send(Command::Surface { kind, message })
            .await
            .map_err(|_| AppError::EngineClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// Receiving ends handed to `Engine::run`.
pub struct EngineInbox {
    commands: mpsc::Receiver<Command>,
    decodes: mpsc::Receiver<DecodeEvent>,
}

pub struct Engine {
    roster: RosterStore,
    gate: ScanGate,
    store: SessionStore,
    hub: LiveHub,
    epoch: ChannelEpoch,
    clock: Clock,
    countdown: Option<Interval>,
    last_outcome: Option<ScanOutcome>,
    last_refresh: Option<DateTime<Utc>>,
    roster_source: Option<RosterSource>,
    duplicates: usize,
    last_error: Option<String>,
}

impl Engine {
    /// Build the engine and restore any persisted attendance.
    ///
    /// Returns the engine, its handle, its inbox, and the sender the capture
    /// session delivers decode events into.
    pub fn new(
        gate: GateConfig,
        store: SessionStore,
        hub: LiveHub,
        epoch: ChannelEpoch,
        clock: Clock,
    ) -> (Self, EngineHandle, EngineInbox, mpsc::Sender<DecodeEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (decode_tx, decode_rx) = mpsc::channel(DECODE_CHANNEL_CAPACITY);

        let mut roster = RosterStore::new();
        match store.load() {
            Ok(Some(saved)) => {
                log::info!(
                    "Restored {} check-ins from session {}",
                    saved.attendance.len(),
                    saved.session_id
                );
                roster.restore_attendance(saved.attendance);
            }
            Ok(None) => {}
            Err(e) => log::error!("Failed to load saved attendance data: {e}"),
        }

        let engine = Self {
            roster,
            gate: ScanGate::new(gate),
            store,
            hub,
            epoch,
            clock,
            countdown: None,
            last_outcome: None,
            last_refresh: None,
            roster_source: None,
            duplicates: 0,
            last_error: None,
        };
        let inbox = EngineInbox { commands: cmd_rx, decodes: decode_rx };
        (engine, EngineHandle { commands: cmd_tx }, inbox, decode_tx)
    }

    pub async fn run(mut self, inbox: EngineInbox) {
        let EngineInbox { mut commands, mut decodes } = inbox;
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                Some(event) = decodes.recv() => self.on_decode(event),
                _ = next_tick(&mut self.countdown) => self.on_tick(),
            }
        }
        log::info!("Attendance engine stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::ReplaceRoster { roster, source, reply } => {
                let _ = reply.send(self.replace_roster(roster, source));
            }
            Command::Scan { raw, reply } => {
                let _ = reply.send(self.scan(&raw));
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.reset());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.roster.snapshot());
            }
            Command::Surface { kind, message } => self.surface(kind, message),
            Command::Shutdown => {}
        }
    }

    fn replace_roster(&mut self, parsed: ParsedRoster, source: RosterSource) -> Stats {
        let seeded = parsed.records.iter().filter(|r| r.attended).count();
        self.duplicates = parsed.duplicates.len();
        self.roster.load(parsed.records);
        self.roster_source = Some(source);
        self.last_refresh = Some((self.clock)());
        self.last_error = None;

        let stats = self.roster.stats();
        log::info!(
            "Roster loaded from {source}: {} registrants, {} present, {} seeded as attended",
            stats.total,
            stats.present,
            seeded
        );
        self.persist();
        self.hub.publish(&LiveEvent::RosterLoaded {
            source: source.to_string(),
            stats,
            duplicates: self.duplicates,
        });
        stats
    }

    fn on_decode(&mut self, event: DecodeEvent) {
        if !self.epoch.is_current(event.epoch) {
            log::debug!("Dropping decode event from stopped channel {}", event.epoch);
            return;
        }
        match event.kind {
            DecodeKind::Decoded(text) => {
                self.scan(&text);
            }
            DecodeKind::Failure(message) => {
                if message.to_lowercase().contains("permission") {
                    let error = AppError::CameraPermissionDenied(message);
                    self.surface(error.kind(), error.to_string());
                } else {
                    log::debug!("{}", AppError::DecodeChannelError(message));
                }
            }
        }
    }

    fn scan(&mut self, raw: &str) -> ScanDecision {
        let now = (self.clock)();
        let decision = self.gate.scan(&mut self.roster, raw, now);

        if self.countdown.is_some() && !self.gate.is_locked(now) {
            self.stop_countdown();
        }

        if let ScanDecision::Processed { outcome, locked } = &decision {
            if matches!(outcome, ScanOutcome::Verified { .. }) {
                self.persist();
            }
            self.last_outcome = Some(outcome.clone());
            self.hub.publish(&LiveEvent::Scan {
                outcome: outcome.clone(),
                message: outcome.message(),
                stats: self.roster.stats(),
            });
            if *locked {
                self.start_countdown(now);
            }
        }
        decision
    }

    fn on_tick(&mut self) {
        match self.gate.tick((self.clock)()) {
            Some(GateTick::Countdown { remaining_secs }) => {
                self.hub.publish(&LiveEvent::Locked { remaining_secs });
            }
            Some(GateTick::Unlocked) | None => self.stop_countdown(),
        }
    }

    fn start_countdown(&mut self, now: DateTime<Utc>) {
        let remaining = self.gate.lock_remaining(now).map(countdown_secs).unwrap_or(0);
        self.hub.publish(&LiveEvent::Locked { remaining_secs: remaining });

        let period = Duration::from_secs(1);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.countdown = Some(interval);
    }

    fn stop_countdown(&mut self) {
        if self.countdown.take().is_some() {
            log::info!("Scanner unlocked");
            self.hub.publish(&LiveEvent::Unlocked);
        }
    }

    fn reset(&mut self) -> Result<Stats, AppError> {
        self.roster.reset();
        self.gate.unlock();
        self.stop_countdown();
        self.last_outcome = None;
        let stats = self.roster.stats();
        self.hub.publish(&LiveEvent::Reset { stats });
        log::warn!("Attendance data reset");
        self.store.clear()?;
        Ok(stats)
    }

    fn surface(&mut self, kind: &str, message: String) {
        log::warn!("{message}");
        self.hub.publish(&LiveEvent::Error {
            kind: kind.to_string(),
            message: message.clone(),
        });
        self.last_error = Some(message);
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(self.roster.attendance(), self.roster.stats()) {
            log::error!("Failed to save attendance data: {e}");
        }
    }

    fn status(&self) -> StatusView {
        let now = (self.clock)();
        let remaining = self.gate.lock_remaining(now);
        StatusView {
            stats: self.roster.stats(),
            locked: remaining.is_some(),
            lock_remaining_secs: remaining.map(countdown_secs),
            failed_attempts: self.gate.failed_attempts(),
            last_outcome: self.last_outcome.clone(),
            last_refresh: self.last_refresh,
            roster_source: self.roster_source,
            duplicates: self.duplicates,
            last_error: self.last_error.clone(),
            session_id: self.store.session_id().to_string(),
        }
    }
}

async fn next_tick(countdown: &mut Option<Interval>) {
    match countdown {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
