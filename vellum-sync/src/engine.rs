//! Sync state machine and orchestration
//!
//! Owns the authoritative [`SyncStatus`], enforces single-flight, runs the
//! pass pipeline (index, check, plan, transfer, apply), and drives auto-sync
//! from two independently cancellable triggers: a fixed-interval timer and a
//! debounced listener on the workspace change stream. Both are cancelled on
//! shutdown together with the push-channel listener.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vellum_index::{ChangeIndexer, ManifestEntry};
use vellum_transport::{
    ChannelEvent, ChannelState, ConflictKind, HttpTransport, PushChannel, PushMessage,
    RemoteConflict, Transport,
};
use vellum_vfs::{is_system_path, Vfs};

use crate::config::{SyncConfig, SyncStrategy, TransportMode};
use crate::conflict::{decide, ConflictChoice, ConflictRegistry, SyncConflict};
use crate::diff::TransferPlan;
use crate::errors::{Result, SyncError};
use crate::events::{EventBus, Subscription, SyncEvent, SyncEventKind};
use crate::logs::{LogLevel, SyncLog, SyncLogEntry};
use crate::state::{ConnectionInfo, SyncPhase, SyncProgress, SyncState, SyncStatus};
use crate::transfer::{TransferExecutor, TransferTick};

/// Quiet period after the last workspace mutation before an auto pass fires,
/// so bursts of edits coalesce into a single pass.
const DEBOUNCE_QUIET: Duration = Duration::from_millis(1500);

/// Idle horizon for the debounce timer while no mutation is pending.
const DEBOUNCE_PARKED: Duration = Duration::from_secs(24 * 60 * 60);

/// How a sync pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Respect the configured direction; a manual-strategy workspace syncs
    /// both ways when triggered.
    Standard,
    /// Upload only, regardless of configured strategy.
    PushOnly,
    /// Download only, regardless of configured strategy.
    PullOnly,
}

fn effective_strategy(configured: SyncStrategy, mode: SyncMode) -> SyncStrategy {
    match mode {
        SyncMode::PushOnly => SyncStrategy::Push,
        SyncMode::PullOnly => SyncStrategy::Pull,
        SyncMode::Standard => match configured {
            SyncStrategy::Manual => SyncStrategy::Bidirectional,
            other => other,
        },
    }
}

/// What one pass accomplished. Failures are per-file; the pass still ends in
/// `Error` state when any remain, but completed transfers stay applied.
#[derive(Debug, Default, Clone)]
pub struct PassSummary {
    pub uploaded: usize,
    pub downloaded: usize,
    pub failures: Vec<(String, String)>,
}

impl PassSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SyncEngine {
    vfs: Arc<dyn Vfs>,
    transport: Arc<dyn Transport>,
    push: Option<Arc<PushChannel>>,
    config: RwLock<SyncConfig>,
    status: RwLock<SyncStatus>,
    conflicts: ConflictRegistry,
    /// Paths rescheduled for upload by client-side conflict resolutions.
    pending_uploads: Mutex<HashSet<String>>,
    sync_log: SyncLog,
    bus: EventBus,
    in_flight: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SyncEngine {
    /// Load configuration from the workspace and build the engine. Call
    /// [`SyncEngine::start`] afterwards to arm the auto-sync triggers.
    pub async fn new(
        vfs: Arc<dyn Vfs>,
        transport: Arc<dyn Transport>,
        push: Option<Arc<PushChannel>>,
    ) -> Result<Arc<Self>> {
        let config = SyncConfig::load(vfs.as_ref()).await?;
        let connection = if config.endpoint.is_empty() {
            None
        } else {
            Some(ConnectionInfo {
                endpoint: config.endpoint.clone(),
                realtime_connected: false,
            })
        };

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Arc::new(Self {
            vfs,
            transport,
            push,
            config: RwLock::new(config),
            status: RwLock::new(SyncStatus {
                connection,
                ..SyncStatus::default()
            }),
            conflicts: ConflictRegistry::new(),
            pending_uploads: Mutex::new(HashSet::new()),
            sync_log: SyncLog::default(),
            bus: EventBus::new(),
            in_flight: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        }))
    }

    /// Arm the auto-sync triggers and, when configured, the push channel.
    pub fn start(self: &Arc<Self>) {
        if self.get_config().transport == TransportMode::Websocket {
            if let Some(push) = &self.push {
                if let Err(e) = push.connect() {
                    self.log(LogLevel::Warn, format!("Push channel start failed: {}", e));
                }
            }
        }
        self.spawn_auto_tasks();
    }

    // ---- public surface -------------------------------------------------

    pub fn get_config(&self) -> SyncConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    /// Persist and adopt a new configuration, rearming the auto-sync
    /// triggers so interval changes take effect immediately.
    pub async fn save_config(self: &Arc<Self>, new: SyncConfig) -> Result<()> {
        new.save(self.vfs.as_ref()).await?;
        *self.config.write().expect("config lock poisoned") = new.clone();

        self.set_status(|st| {
            st.connection = if new.endpoint.is_empty() {
                None
            } else {
                Some(ConnectionInfo {
                    endpoint: new.endpoint.clone(),
                    realtime_connected: st
                        .connection
                        .as_ref()
                        .map(|c| c.realtime_connected)
                        .unwrap_or(false),
                })
            };
        });

        self.restart_auto_tasks();
        self.log(LogLevel::Info, "Configuration saved");
        Ok(())
    }

    pub fn get_status(&self) -> SyncStatus {
        self.status.read().expect("status lock poisoned").clone()
    }

    pub fn get_conflicts(&self) -> Vec<SyncConflict> {
        self.conflicts.list()
    }

    pub fn get_logs(&self, limit: Option<usize>) -> Vec<SyncLogEntry> {
        self.sync_log.recent(limit)
    }

    pub fn clear_logs(&self) {
        self.sync_log.clear();
    }

    /// Subscribe to one kind of engine event. The returned handle must be
    /// kept; dropping it without calling `unsubscribe` leaves the handler
    /// registered until engine shutdown.
    pub fn on(
        &self,
        kind: SyncEventKind,
        handler: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(kind, handler)
    }

    /// Probe an endpoint with the given credentials, without touching the
    /// engine's own transport or configuration.
    pub async fn test_connection(
        &self,
        url: &str,
        username: &str,
        token: Option<String>,
    ) -> Result<()> {
        let probe = HttpTransport::new(url, token)?;
        probe.ping().await?;
        self.log(
            LogLevel::Info,
            format!("Connection test succeeded for {}@{}", username, url),
        );
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        if self.in_flight.load(Ordering::SeqCst) {
            return Err(SyncError::AlreadySyncing);
        }
        self.set_status(|st| st.state = SyncState::Paused);
        self.log(LogLevel::Info, "Sync paused");
        Ok(())
    }

    pub fn resume(&self) {
        let mut changed = false;
        self.set_status(|st| {
            if st.state == SyncState::Paused {
                st.state = SyncState::Idle;
                changed = true;
            }
        });
        if changed {
            self.log(LogLevel::Info, "Sync resumed");
        }
    }

    /// Cancel the auto-sync triggers, stop the push channel and drop every
    /// event handler. The engine is inert afterwards.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.lock().expect("task list poisoned").drain(..) {
            task.abort();
        }
        if let Some(push) = &self.push {
            push.shutdown();
        }
        self.bus.clear();
        info!("Sync engine shut down");
    }

    // ---- sync pass ------------------------------------------------------

    /// Run one sync pass. Rejected with [`SyncError::AlreadySyncing`] while
    /// another pass is active: the check-and-set below is the single-flight
    /// guarantee, so a manual trigger racing the interval timer cannot start
    /// a second pass.
    pub async fn trigger_sync(self: &Arc<Self>, mode: SyncMode) -> Result<PassSummary> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadySyncing);
        }

        let outcome = self.run_guarded(mode).await;
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_guarded(&self, mode: SyncMode) -> Result<PassSummary> {
        if self.get_status().state == SyncState::Paused {
            return Err(SyncError::Paused);
        }

        let cfg = self.get_config();
        if let Some(missing) = cfg.missing_requirement() {
            let err = SyncError::Configuration(missing.to_string());
            self.fail(&err);
            return Err(err);
        }

        self.set_status(|st| {
            st.state = SyncState::Connecting;
            st.progress = None;
            st.error_message = None;
        });

        if let Err(e) = self.transport.ping().await {
            let err: SyncError = e.into();
            self.fail(&err);
            return Err(err);
        }

        self.set_status(|st| {
            st.state = SyncState::Syncing;
            st.progress = Some(SyncProgress::phase_only(SyncPhase::Preparing));
        });
        self.log(LogLevel::Info, "Sync pass started");

        match self.run_pass(&cfg, mode).await {
            Ok(summary) if summary.is_clean() => {
                self.set_status(|st| {
                    st.state = SyncState::Success;
                    st.last_sync_time = Some(chrono::Utc::now());
                    st.progress = None;
                    st.error_message = None;
                });
                self.log(
                    LogLevel::Info,
                    format!(
                        "Sync pass finished: {} uploaded, {} downloaded",
                        summary.uploaded, summary.downloaded
                    ),
                );
                Ok(summary)
            }
            Ok(summary) => {
                // Partial failure: applied transfers stay applied, the pass
                // itself is reported as failed.
                let err = SyncError::Transfer {
                    path: summary.failures[0].0.clone(),
                    reason: format!("{} file transfer(s) failed", summary.failures.len()),
                };
                self.fail(&err);
                Ok(summary)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_pass(&self, cfg: &SyncConfig, mode: SyncMode) -> Result<PassSummary> {
        let strategy = effective_strategy(cfg.strategy, mode);
        let started = Instant::now();

        // Preparing: index the workspace and ask the remote what diverged.
        let indexer = ChangeIndexer::new(self.vfs.clone(), cfg.filters.clone());
        let local = indexer.build_manifest().await?;
        let check = self.transport.check(&local).await.map_err(SyncError::from)?;

        let mut auto_resolutions: Vec<(SyncConflict, ManifestEntry, ConflictChoice)> = Vec::new();
        for report in &check.conflicts {
            let conflict = SyncConflict::from_remote(report.clone(), local.get(&report.path));
            let remote_entry = ManifestEntry {
                path: conflict.path.clone(),
                content_hash: conflict.remote_change.hash.clone(),
                modified_at: conflict.remote_change.timestamp,
                size: conflict.remote_change.size,
                deleted: conflict.kind == ConflictKind::Delete,
            };

            match decide(cfg.conflict_policy, &conflict) {
                Some(choice) => auto_resolutions.push((conflict, remote_entry, choice)),
                None => {
                    self.log(
                        LogLevel::Warn,
                        format!("Conflict detected on {}", conflict.path),
                    );
                    self.conflicts.insert(conflict.clone());
                    self.bus.emit(SyncEvent::Conflict(conflict));
                }
            }
        }

        let mut plan = TransferPlan::from_check(&check, strategy);

        // Re-uploads scheduled by earlier client-side resolutions.
        if strategy != SyncStrategy::Pull {
            let pending: Vec<String> = {
                let mut pending = self.pending_uploads.lock().expect("pending lock poisoned");
                pending.drain().collect()
            };
            for path in pending {
                if !plan.uploads.contains(&path) {
                    plan.uploads.push(path);
                }
            }
        }

        // Paths awaiting manual resolution do not transfer.
        plan.exclude_paths(&self.conflicts.paths());

        // Apply the configured policy to this pass's conflicts, still
        // honoring the direction gate.
        for (conflict, remote_entry, choice) in &auto_resolutions {
            match choice {
                ConflictChoice::Remote => {
                    plan.uploads.retain(|p| p != &conflict.path);
                    if strategy != SyncStrategy::Push
                        && !plan.downloads.iter().any(|e| e.path == conflict.path)
                    {
                        plan.downloads.push(remote_entry.clone());
                    }
                }
                ConflictChoice::Local => {
                    plan.downloads.retain(|e| e.path != conflict.path);
                    if strategy != SyncStrategy::Pull && !plan.uploads.contains(&conflict.path) {
                        plan.uploads.push(conflict.path.clone());
                    }
                }
            }
        }

        debug!(
            "Transfer plan: {} upload(s), {} download(s)",
            plan.uploads.len(),
            plan.downloads.len()
        );

        let executor = TransferExecutor::new(self.transport.clone(), self.vfs.clone(), cfg);

        let on_upload = |tick: TransferTick| {
            self.update_progress(progress_from_tick(SyncPhase::Uploading, &tick, started));
        };
        let up_report = executor.upload_files(plan.uploads.clone(), &on_upload).await;

        let on_download = |tick: TransferTick| {
            self.update_progress(progress_from_tick(SyncPhase::Downloading, &tick, started));
        };
        let down_report = executor
            .download_files(plan.downloads.clone(), &on_download)
            .await;

        // Applying: acknowledge this pass's policy resolutions.
        self.update_progress(SyncProgress::phase_only(SyncPhase::Applying));
        for (conflict, _, choice) in auto_resolutions {
            if let Err(e) = self
                .transport
                .acknowledge_conflict(&conflict.id, choice.as_str())
                .await
            {
                self.log(
                    LogLevel::Warn,
                    format!("Could not acknowledge conflict {}: {}", conflict.id, e),
                );
            }
            let mut resolved = conflict;
            resolved.resolved = true;
            resolved.resolution = Some(choice);
            self.bus.emit(SyncEvent::Conflict(resolved));
        }

        self.update_progress(SyncProgress::phase_only(SyncPhase::Finalizing));

        let mut failures = up_report.failed;
        failures.extend(down_report.failed);
        Ok(PassSummary {
            uploaded: up_report.completed.len(),
            downloaded: down_report.completed.len(),
            failures,
        })
    }

    // ---- conflict resolution -------------------------------------------

    /// Resolve one outstanding conflict. `Remote` applies the remote bytes
    /// immediately; `Local` keeps local content and schedules a re-upload
    /// for the next pass. The conflict leaves the active set either way.
    pub async fn resolve_conflict(&self, id: &str, choice: ConflictChoice) -> Result<()> {
        let conflict = self
            .conflicts
            .take(id)
            .ok_or_else(|| SyncError::ConflictNotFound(id.to_string()))?;

        match self.apply_resolution(conflict.clone(), choice).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Resolution did not take effect; the conflict stays active.
                self.conflicts.insert(conflict);
                self.log(LogLevel::Error, format!("Conflict resolution failed: {}", e));
                Err(e)
            }
        }
    }

    /// Apply one choice to every outstanding conflict, continuing past
    /// per-item failures. Returns how many were resolved.
    pub async fn resolve_all_conflicts(&self, choice: ConflictChoice) -> usize {
        let mut resolved = 0usize;
        for conflict in self.conflicts.list() {
            match self.resolve_conflict(&conflict.id, choice).await {
                Ok(()) => resolved += 1,
                Err(e) => self.log(
                    LogLevel::Error,
                    format!("Could not resolve conflict on {}: {}", conflict.path, e),
                ),
            }
        }
        resolved
    }

    async fn apply_resolution(
        &self,
        mut conflict: SyncConflict,
        choice: ConflictChoice,
    ) -> Result<()> {
        let cfg = self.get_config();
        match choice {
            ConflictChoice::Remote => {
                let executor =
                    TransferExecutor::new(self.transport.clone(), self.vfs.clone(), &cfg);
                executor.apply_remote(&conflict.path).await?;
            }
            ConflictChoice::Local => {
                self.pending_uploads
                    .lock()
                    .expect("pending lock poisoned")
                    .insert(conflict.path.clone());
            }
        }

        if let Err(e) = self
            .transport
            .acknowledge_conflict(&conflict.id, choice.as_str())
            .await
        {
            self.log(
                LogLevel::Warn,
                format!("Could not acknowledge conflict {}: {}", conflict.id, e),
            );
        }

        conflict.resolved = true;
        conflict.resolution = Some(choice);
        self.log(
            LogLevel::Info,
            format!("Resolved conflict on {} ({})", conflict.path, choice.as_str()),
        );
        self.bus.emit(SyncEvent::Conflict(conflict));
        Ok(())
    }

    async fn register_remote_conflict(&self, report: RemoteConflict) {
        let conflict = SyncConflict::from_remote(report, None);
        match decide(self.get_config().conflict_policy, &conflict) {
            Some(choice) => {
                if let Err(e) = self.apply_resolution(conflict, choice).await {
                    self.log(
                        LogLevel::Error,
                        format!("Auto-resolution of pushed conflict failed: {}", e),
                    );
                }
            }
            None => {
                self.log(
                    LogLevel::Warn,
                    format!("Conflict detected on {}", conflict.path),
                );
                self.conflicts.insert(conflict.clone());
                self.bus.emit(SyncEvent::Conflict(conflict));
            }
        }
    }

    // ---- status & logging ----------------------------------------------

    fn set_status(&self, mutate: impl FnOnce(&mut SyncStatus)) {
        let snapshot = {
            let mut status = self.status.write().expect("status lock poisoned");
            mutate(&mut status);
            status.clone()
        };
        self.bus.emit(SyncEvent::Status(snapshot));
    }

    fn update_progress(&self, progress: SyncProgress) {
        {
            let mut status = self.status.write().expect("status lock poisoned");
            if status.state != SyncState::Syncing {
                return;
            }
            status.progress = Some(progress.clone());
        }
        self.bus.emit(SyncEvent::Progress(progress));
    }

    fn fail(&self, err: &SyncError) {
        self.log(LogLevel::Error, err.to_string());
        self.set_status(|st| {
            st.state = SyncState::Error;
            st.error_message = Some(err.to_string());
            st.progress = None;
        });
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        let entry = self.sync_log.record(level, message);
        self.bus.emit(SyncEvent::Log(entry));
    }

    // ---- auto-sync triggers --------------------------------------------

    fn restart_auto_tasks(self: &Arc<Self>) {
        for task in self.tasks.lock().expect("task list poisoned").drain(..) {
            task.abort();
        }
        self.spawn_auto_tasks();
    }

    fn spawn_auto_tasks(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        tasks.push(self.spawn_interval_timer());
        tasks.push(self.spawn_change_listener());
        if self.push.is_some() {
            tasks.push(self.spawn_push_listener());
        }
    }

    /// Fixed-interval trigger. A tick that lands while a pass is running is
    /// skipped; the interval keeps its cadence, so there is no reschedule
    /// drift.
    fn spawn_interval_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let minutes = self.get_config().auto_sync_interval_minutes.max(1);
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval fires immediately; the first tick is not a trigger.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(engine) = weak.upgrade() else { break };
                        engine.auto_pass("interval").await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Debounced workspace-change trigger: waits for a quiet period after
    /// the last mutation so an edit burst becomes one pass. Mutations inside
    /// system modules (configuration writes among them) do not count.
    fn spawn_change_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut events = self.vfs.subscribe();
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let timer = tokio::time::sleep(DEBOUNCE_PARKED);
            tokio::pin!(timer);
            let mut armed = false;

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(ev) => {
                            if is_system_path(&ev.path) {
                                continue;
                            }
                            armed = true;
                            timer.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE_QUIET);
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    () = &mut timer, if armed => {
                        armed = false;
                        timer.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE_PARKED);
                        let Some(engine) = weak.upgrade() else { break };
                        engine.auto_pass("change debounce").await;
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    fn spawn_push_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut receiver = self
            .push
            .as_ref()
            .expect("push listener without channel")
            .subscribe();
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = receiver.recv() => match event {
                        Ok(ChannelEvent::Message(PushMessage::Changes { paths })) => {
                            let Some(engine) = weak.upgrade() else { break };
                            engine.log(
                                LogLevel::Info,
                                format!("Remote changed {} file(s)", paths.len()),
                            );
                            engine.auto_pass("remote change").await;
                        }
                        Ok(ChannelEvent::Message(PushMessage::Conflict { conflict })) => {
                            let Some(engine) = weak.upgrade() else { break };
                            engine.register_remote_conflict(conflict).await;
                        }
                        Ok(ChannelEvent::Message(_)) => {}
                        Ok(ChannelEvent::State(state)) => {
                            let Some(engine) = weak.upgrade() else { break };
                            engine.on_channel_state(state);
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Shared gate for both auto triggers: silently skip when auto-sync is
    /// off, no endpoint is configured, the engine is paused or offline, or
    /// a pass is already running.
    async fn auto_pass(self: &Arc<Self>, reason: &str) {
        let cfg = self.get_config();
        if !cfg.auto_sync || cfg.endpoint.trim().is_empty() {
            return;
        }
        match self.get_status().state {
            SyncState::Paused | SyncState::Offline => return,
            _ => {}
        }
        if self.in_flight.load(Ordering::SeqCst) {
            debug!("Skipping {} trigger: sync already running", reason);
            return;
        }

        match self.trigger_sync(SyncMode::Standard).await {
            Ok(_) => {}
            Err(SyncError::AlreadySyncing) => {
                debug!("Skipping {} trigger: sync already running", reason)
            }
            // Already logged and reflected in status by the pass itself.
            Err(e) => debug!("Auto sync ({}) failed: {}", reason, e),
        }
    }

    fn on_channel_state(&self, state: ChannelState) {
        let auto_sync = self.get_config().auto_sync;
        match state {
            ChannelState::Connected => {
                self.set_status(|st| {
                    if let Some(conn) = st.connection.as_mut() {
                        conn.realtime_connected = true;
                    }
                    if st.state == SyncState::Offline {
                        st.state = SyncState::Idle;
                    }
                });
                self.log(LogLevel::Info, "Realtime channel connected");
            }
            ChannelState::Disconnected | ChannelState::Exhausted => {
                self.set_status(|st| {
                    if let Some(conn) = st.connection.as_mut() {
                        conn.realtime_connected = false;
                    }
                    // A pass already in flight reports its own outcome.
                    if auto_sync && st.state != SyncState::Syncing {
                        st.state = SyncState::Offline;
                    }
                });
                self.log(LogLevel::Warn, "Realtime channel disconnected");
            }
            ChannelState::Connecting => {}
        }
    }
}

fn progress_from_tick(phase: SyncPhase, tick: &TransferTick, started: Instant) -> SyncProgress {
    let elapsed = started.elapsed().as_secs_f64();
    let speed_bps = if elapsed > 0.0 && tick.bytes_so_far > 0 {
        Some(tick.bytes_so_far as f64 / elapsed)
    } else {
        None
    };
    SyncProgress {
        phase,
        current: tick.index,
        total: tick.total,
        current_file: Some(tick.path.clone()),
        bytes_transferred: Some(tick.bytes_so_far),
        speed_bps,
    }
}
