//! Playback Session - one video, one adapter, one state machine
//!
//! A session runs as its own task and coordinates:
//! - adapter construction, the bounded ready wait and the single fallback
//! - the phase state machine
//! - position sampling while playing
//! - progress reporting
//! - quality updates when telemetry changes
//!
//! The [`PlaybackSession`] handle sends commands to the task and observes it
//! through a `watch` of [`PlaybackState`] and a `broadcast` of [`SessionEvent`]s.

use crate::adapter::{AdapterContext, AdapterEvent, AdapterFactory, AdapterMode, PlayerAdapter, SessionGuard};
use crate::descriptor::VideoDescriptor;
use crate::progress::{HttpProgressSink, ProgressReport, ProgressReporter, ProgressSink, StoredProgress};
use crate::quality::{QualityDecision, QualityPolicy};
use crate::telemetry::TelemetrySnapshot;
use crate::types::*;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle notifications published by a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged {
        from: PlaybackPhase,
        to: PlaybackPhase,
    },
    Ready {
        duration: Option<f64>,
    },
    QualityChanged(QualityDecision),
    FallbackStarted {
        backend: BackendKind,
        reason: String,
    },
    ProgressReported(ProgressReport),
    /// Completion threshold reached; sent once per video
    Completed,
    Restored(StoredProgress),
    /// Permanent failure; playback continues only on the external site
    Failed(ErrorInfo),
}

/// Shared collaborators every session is built from
#[derive(Clone)]
pub struct SessionServices {
    pub factory: Arc<dyn AdapterFactory>,
    pub config: Arc<PlaybackConfig>,
    pub policy: QualityPolicy,
    pub telemetry: watch::Receiver<TelemetrySnapshot>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl SessionServices {
    /// Services with fixed default telemetry and no progress delivery
    pub fn new(factory: Arc<dyn AdapterFactory>, config: PlaybackConfig) -> Self {
        let (_, telemetry) = watch::channel(TelemetrySnapshot::default());
        Self {
            factory,
            policy: QualityPolicy::from(&config),
            config: Arc::new(config),
            telemetry,
            progress: None,
        }
    }

    /// Services reporting progress to the configured REST backend
    pub fn http(factory: Arc<dyn AdapterFactory>, config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        let services = Self::new(factory, config);
        let sink = HttpProgressSink::new(Arc::clone(&services.config))?;
        Ok(services.with_progress_sink(Arc::new(sink)))
    }

    pub fn with_telemetry(mut self, telemetry: watch::Receiver<TelemetrySnapshot>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }
}

#[derive(Debug)]
enum Command {
    Start(Box<VideoDescriptor>),
    Play,
    Pause,
    ToggleMute,
    Close,
}

/// Handle to a running playback session
pub struct PlaybackSession {
    id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<PlaybackState>,
    events: broadcast::Sender<SessionEvent>,
    guard: SessionGuard,
    task: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Spawn an idle session
    pub fn spawn(services: SessionServices, options: SessionOptions) -> Self {
        let id = SessionId::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlaybackState::default());
        let (events, _) = broadcast::channel(64);
        let guard = SessionGuard::new();
        let telemetry = services.telemetry.clone();
        let snapshot = telemetry.borrow().clone();

        let actor = SessionActor {
            id,
            telemetry,
            snapshot,
            services,
            options,
            guard: guard.clone(),
            commands: command_rx,
            state: PlaybackState::default(),
            state_tx,
            events: events.clone(),
            descriptor: None,
            adapter: None,
            fallback_used: false,
            ready_deadline: None,
            sampler: None,
            reporter: None,
            restore: None,
        };
        let task = tokio::spawn(actor.run());

        Self {
            id,
            commands,
            state_rx,
            events,
            guard,
            task: Some(task),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Element id the session's player is keyed by
    pub fn element_id(&self) -> String {
        self.id.element_id()
    }

    /// Start a video, replacing the current one
    pub fn start(&self, descriptor: VideoDescriptor) -> Result<()> {
        self.send(Command::Start(Box::new(descriptor)))
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.send(Command::ToggleMute)
    }

    /// Latest published state
    pub fn state(&self) -> PlaybackState {
        self.state_rx.borrow().clone()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state_rx.borrow().phase
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_active()
    }

    /// Tear the session down and wait for it to finish
    ///
    /// Pending continuations observe the teardown immediately; the task then
    /// destroys the adapter and flushes unreported progress.
    pub async fn close(mut self) {
        self.guard.deactivate();
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(session_id = %self.id, error = %e, "Session task failed");
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        if !self.guard.is_active() {
            return Err(Error::SessionClosed);
        }
        self.commands.send(command).map_err(|_| Error::SessionClosed)
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.guard.deactivate();
        let _ = self.commands.send(Command::Close);
    }
}

/// Task state of one session
struct SessionActor {
    id: SessionId,
    services: SessionServices,
    options: SessionOptions,
    guard: SessionGuard,
    commands: mpsc::UnboundedReceiver<Command>,
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    events: broadcast::Sender<SessionEvent>,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    /// Snapshot the current quality decision was derived from
    snapshot: TelemetrySnapshot,
    descriptor: Option<VideoDescriptor>,
    adapter: Option<Box<dyn PlayerAdapter>>,
    fallback_used: bool,
    ready_deadline: Option<Instant>,
    sampler: Option<Interval>,
    reporter: Option<ProgressReporter>,
    restore: Option<oneshot::Receiver<StoredProgress>>,
}

impl SessionActor {
    async fn run(mut self) {
        debug!(session_id = %self.id, "Session task started");

        while self.guard.is_active() {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = next_adapter_event(&mut self.adapter) => self.handle_adapter_event(event).await,
                _ = wait_deadline(self.ready_deadline) => self.handle_ready_timeout().await,
                _ = next_tick(&mut self.sampler) => self.sample(),
                _ = telemetry_changed(&mut self.telemetry) => self.handle_telemetry().await,
                stored = restored(&mut self.restore) => self.apply_restored(stored),
            }
        }

        self.teardown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(descriptor) => self.start(*descriptor).await,
            Command::Play => self.play().await,
            Command::Pause => self.pause().await,
            Command::ToggleMute => {
                if let Some(adapter) = self.adapter.as_mut() {
                    self.state.is_muted = adapter.toggle_mute().await;
                    self.publish();
                }
            }
            Command::Close => {}
        }
    }

    // State machine

    /// Transition to a new phase
    fn set_phase(&mut self, to: PlaybackPhase) -> Result<()> {
        let from = self.state.phase;

        if !from.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.state.phase = to;
        if to == PlaybackPhase::Playing {
            self.start_sampler();
        } else {
            self.sampler = None;
        }
        self.publish();
        self.emit(SessionEvent::PhaseChanged { from, to });

        info!(session_id = %self.id, from = %from, to = %to, "State transition");

        Ok(())
    }

    /// Apply a backend-driven transition, ignoring ones the current phase cannot take
    fn follow(&mut self, to: PlaybackPhase) {
        if self.state.phase == to {
            return;
        }
        if let Err(e) = self.set_phase(to) {
            debug!(session_id = %self.id, error = %e, "Backend event ignored");
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // Commands

    #[instrument(skip(self, descriptor), fields(session_id = %self.id, video_id = %descriptor.id))]
    async fn start(&mut self, descriptor: VideoDescriptor) {
        if self.state.phase != PlaybackPhase::Idle {
            self.reset().await;
        }

        let backend = descriptor.backend_kind();
        self.snapshot = self.telemetry.borrow_and_update().clone();
        let decision = self
            .services
            .policy
            .decide(&self.snapshot, backend, self.options.quality);
        self.state.quality = Some(decision.clone());
        self.state.duration_seconds = descriptor.duration_hint;
        self.descriptor = Some(descriptor.clone());

        if let Err(error) = descriptor.validate() {
            self.fail_permanently(error);
            return;
        }

        let mut reporter = ProgressReporter::new(
            descriptor.id.clone(),
            &self.services.config,
            decision.low_bandwidth_mode,
        );
        if let (Some(sink), Some(email)) = (&self.services.progress, &self.options.user_email) {
            reporter = reporter.with_delivery(Arc::clone(sink), email.clone());
        }
        self.reporter = Some(reporter);
        self.spawn_restore(&descriptor);

        if let Err(e) = self.set_phase(PlaybackPhase::Initializing) {
            error!(error = %e, "Session could not initialize");
            return;
        }

        info!(%backend, tier = %decision.tier, "Starting playback");
        let adapter = self
            .services
            .factory
            .primary(self.adapter_context(&descriptor, &decision));
        if let Err(error) = self.launch(adapter).await {
            self.handle_failure(error).await;
        }
    }

    async fn play(&mut self) {
        if !matches!(self.state.phase, PlaybackPhase::Ready | PlaybackPhase::Paused) {
            debug!(session_id = %self.id, phase = %self.state.phase, "Play ignored");
            return;
        }
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        if adapter.mode() == AdapterMode::NativeEmbed {
            debug!(session_id = %self.id, "Native embed is controlled by the viewer");
            return;
        }
        if adapter.play().await {
            self.follow(PlaybackPhase::Playing);
        } else {
            warn!(session_id = %self.id, phase = %self.state.phase, "Backend did not start playback");
        }
    }

    async fn pause(&mut self) {
        if !matches!(self.state.phase, PlaybackPhase::Playing | PlaybackPhase::Buffering) {
            return;
        }
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.pause().await;
        }
        self.follow(PlaybackPhase::Paused);
    }

    /// Destroy the current video and force the session back to idle
    async fn reset(&mut self) {
        self.ready_deadline = None;
        self.sampler = None;
        self.restore = None;
        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy().await;
        }
        if let Some(reporter) = self.reporter.take() {
            // Flush in the background so the next video starts at once
            let flush_timeout = self.services.config.flush_timeout();
            tokio::spawn(reporter.close(flush_timeout));
        }

        let from = self.state.phase;
        self.descriptor = None;
        self.fallback_used = false;
        self.state = PlaybackState::default();
        self.publish();
        self.emit(SessionEvent::PhaseChanged {
            from,
            to: PlaybackPhase::Idle,
        });
        info!(session_id = %self.id, from = %from, "Session reset for a new video");
    }

    // Adapter lifecycle

    fn adapter_context(&self, descriptor: &VideoDescriptor, decision: &QualityDecision) -> AdapterContext {
        AdapterContext {
            element_id: self.id.element_id(),
            descriptor: descriptor.clone(),
            decision: decision.clone(),
            autoplay: self.options.autoplay && decision.allow_autoplay,
            config: Arc::clone(&self.services.config),
            guard: self.guard.clone(),
        }
    }

    /// Initialize an adapter and arm the ready deadline
    ///
    /// The adapter becomes the active one whatever the outcome, so a failure
    /// path always has something to tear down.
    async fn launch(&mut self, mut adapter: Box<dyn PlayerAdapter>) -> Result<()> {
        let backend = adapter.backend();
        let wait = self.services.config.init_timeout();
        let deadline = Instant::now() + wait;

        let outcome = match timeout_at(deadline, adapter.initialize()).await {
            Ok(result) => result,
            Err(_) => Err(Error::InitTimeout {
                backend,
                waited_ms: wait.as_millis() as u64,
            }),
        };

        self.state.fallback_active = self.fallback_used || adapter.is_degraded();
        self.adapter = Some(adapter);
        outcome?;
        self.guard.check()?;

        self.ready_deadline = Some(deadline);
        self.publish();
        Ok(())
    }

    /// Absorb an adapter failure with the one allowed fallback, or fail permanently
    async fn handle_failure(&mut self, mut error: Error) {
        loop {
            self.ready_deadline = None;
            let degraded = self.adapter.as_ref().is_some_and(|a| a.is_degraded());
            if let Some(mut adapter) = self.adapter.take() {
                adapter.destroy().await;
            }
            if matches!(error, Error::SessionClosed) {
                return;
            }
            if degraded {
                // An adapter that already fell back on its own used the budget
                self.fallback_used = true;
            }

            let Some(descriptor) = self.descriptor.clone() else {
                return;
            };
            if !error.is_recoverable() || self.fallback_used {
                self.fail_permanently(error);
                return;
            }

            self.fallback_used = true;
            let backend = descriptor.backend_kind();
            warn!(session_id = %self.id, %backend, error = %error, "Adapter failed, falling back to native player");

            self.state.error = Some(ErrorInfo::from_error(&error, false, descriptor.external_url()));
            self.follow(PlaybackPhase::Errored);
            self.emit(SessionEvent::FallbackStarted {
                backend,
                reason: error.to_string(),
            });
            self.follow(PlaybackPhase::Initializing);

            let decision = match self.state.quality.clone() {
                Some(decision) => decision,
                None => self
                    .services
                    .policy
                    .decide(&self.snapshot, backend, self.options.quality),
            };
            let adapter = self
                .services
                .factory
                .fallback(self.adapter_context(&descriptor, &decision));
            match self.launch(adapter).await {
                Ok(()) => return,
                Err(next) => error = next,
            }
        }
    }

    fn fail_permanently(&mut self, error: Error) {
        let external_url = self.descriptor.as_ref().and_then(|d| d.external_url());
        let info = ErrorInfo::from_error(&error, true, external_url);
        error!(
            session_id = %self.id,
            code = %info.code,
            error = %error,
            "Playback failed permanently"
        );

        self.ready_deadline = None;
        self.state.error = Some(info.clone());
        if self.state.phase == PlaybackPhase::Errored {
            self.publish();
        } else {
            self.follow(PlaybackPhase::Errored);
        }
        self.emit(SessionEvent::Failed(info));
    }

    async fn handle_ready_timeout(&mut self) {
        self.ready_deadline = None;
        if self.state.phase != PlaybackPhase::Initializing {
            return;
        }
        let Some(backend) = self.adapter.as_ref().map(|a| a.backend()) else {
            return;
        };
        let waited_ms = self.services.config.init_timeout_ms;
        warn!(session_id = %self.id, %backend, waited_ms, "Player never became ready");
        self.handle_failure(Error::InitTimeout { backend, waited_ms }).await;
    }

    async fn handle_adapter_event(&mut self, event: AdapterEvent) {
        debug!(session_id = %self.id, ?event, "Adapter event");
        match event {
            AdapterEvent::Ready { duration } => self.handle_ready(duration).await,
            AdapterEvent::Play => {
                if matches!(
                    self.state.phase,
                    PlaybackPhase::Ready | PlaybackPhase::Paused | PlaybackPhase::Buffering
                ) {
                    self.follow(PlaybackPhase::Playing);
                }
            }
            AdapterEvent::Pause => self.follow(PlaybackPhase::Paused),
            AdapterEvent::Buffering(true) => {
                if self.state.phase == PlaybackPhase::Playing {
                    self.follow(PlaybackPhase::Buffering);
                }
            }
            // Playback started from the player's own controls may resume
            // out of a buffering spell the session never saw begin
            AdapterEvent::Buffering(false) => {
                if matches!(
                    self.state.phase,
                    PlaybackPhase::Ready | PlaybackPhase::Paused | PlaybackPhase::Buffering
                ) {
                    self.follow(PlaybackPhase::Playing);
                }
            }
            AdapterEvent::Ended => self.handle_ended(),
            AdapterEvent::Error { reason } => {
                if !self.state.phase.is_active() {
                    return;
                }
                let error = match self.adapter.as_ref() {
                    Some(adapter) => adapter.runtime_error(reason),
                    None => {
                        let backend = self
                            .descriptor
                            .as_ref()
                            .map(|d| d.backend_kind())
                            .unwrap_or(BackendKind::File);
                        Error::runtime(backend, reason)
                    }
                };
                self.handle_failure(error).await;
            }
        }
    }

    async fn handle_ready(&mut self, duration: Option<f64>) {
        if self.state.phase != PlaybackPhase::Initializing {
            debug!(session_id = %self.id, "Duplicate ready ignored");
            return;
        }
        self.ready_deadline = None;
        if duration.is_some() {
            self.state.duration_seconds = duration;
        }
        self.state.error = None;
        self.follow(PlaybackPhase::Ready);
        self.emit(SessionEvent::Ready {
            duration: self.state.duration_seconds,
        });

        let allowed = self
            .state
            .quality
            .as_ref()
            .is_some_and(|q| q.allow_autoplay);
        if self.options.autoplay && allowed {
            self.play().await;
        }
    }

    fn handle_ended(&mut self) {
        if !matches!(
            self.state.phase,
            PlaybackPhase::Playing | PlaybackPhase::Buffering
        ) {
            debug!(session_id = %self.id, phase = %self.state.phase, "End ignored");
            return;
        }

        if let Some(duration) = self.state.duration_seconds {
            self.state.position_seconds = duration;
        }
        self.state.progress_percent = 100.0;
        self.follow(PlaybackPhase::Ended);

        let position = self.state.position_seconds;
        if let Some(report) = self.reporter.as_mut().map(|r| r.finish(position)) {
            self.emit(SessionEvent::ProgressReported(report));
        }
        self.sync_progress();
        self.publish();
    }

    // Sampling and reporting

    fn start_sampler(&mut self) {
        if self.sampler.is_some() {
            return;
        }
        let period = self.services.config.sample_interval();
        let mut sampler = interval_at(Instant::now() + period, period);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.sampler = Some(sampler);
    }

    fn sample(&mut self) {
        if !self.guard.is_active() || self.state.phase != PlaybackPhase::Playing {
            self.sampler = None;
            return;
        }
        let Some(adapter) = self.adapter.as_ref() else {
            return;
        };

        let duration = adapter.duration().or(self.state.duration_seconds);
        let mut position = adapter.position();
        if let Some(d) = duration {
            position = position.min(d);
        }
        let percent = progress_percent(position, duration);

        self.state.position_seconds = position;
        self.state.duration_seconds = duration;
        self.state.progress_percent = percent;

        let watched = self.services.config.sample_interval();
        if let Some(report) = self
            .reporter
            .as_mut()
            .and_then(|r| r.record(watched, position, percent))
        {
            self.emit(SessionEvent::ProgressReported(report));
        }
        self.sync_progress();
        self.publish();
    }

    /// Mirror reporter progress into the published state
    fn sync_progress(&mut self) {
        let Some(reporter) = self.reporter.as_ref() else {
            return;
        };
        self.state.last_reported_progress_percent = reporter.last_reported_percent();
        if reporter.completed() && !self.state.completed {
            self.state.completed = true;
            info!(session_id = %self.id, "Video completed");
            self.emit(SessionEvent::Completed);
        }
    }

    // Telemetry

    async fn handle_telemetry(&mut self) {
        let snapshot = self.telemetry.borrow_and_update().clone();
        let significant = self.services.policy.significant_change(&self.snapshot, &snapshot);
        self.snapshot = snapshot;

        if !significant || !self.state.phase.is_active() {
            return;
        }
        let Some(backend) = self.descriptor.as_ref().map(|d| d.backend_kind()) else {
            return;
        };

        let decision = self
            .services
            .policy
            .decide(&self.snapshot, backend, self.options.quality);
        if self.state.quality.as_ref() == Some(&decision) {
            return;
        }

        info!(
            session_id = %self.id,
            tier = %decision.tier,
            low_bandwidth = decision.low_bandwidth_mode,
            "Telemetry changed, applying new quality"
        );
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.apply_quality(&decision).await;
        }
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.set_low_bandwidth(decision.low_bandwidth_mode);
        }
        self.state.quality = Some(decision.clone());
        self.publish();
        self.emit(SessionEvent::QualityChanged(decision));
    }

    // Restoration

    fn spawn_restore(&mut self, descriptor: &VideoDescriptor) {
        self.restore = None;
        if !self.options.restore_progress {
            return;
        }
        let (Some(sink), Some(email)) = (self.services.progress.clone(), self.options.user_email.clone())
        else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        let guard = self.guard.clone();
        let video_id = descriptor.id.clone();
        tokio::spawn(async move {
            match sink.fetch(&email, &video_id).await {
                Ok(Some(stored)) if guard.is_active() => {
                    let _ = tx.send(stored);
                }
                Ok(_) => {}
                Err(e) => debug!(%video_id, error = %e, "Stored progress unavailable"),
            }
        });
        self.restore = Some(rx);
    }

    fn apply_restored(&mut self, stored: StoredProgress) {
        debug!(
            session_id = %self.id,
            percent = stored.progress_percentage,
            completed = stored.completed,
            "Stored progress restored"
        );
        if stored.progress_percentage > 0.0 {
            self.state.resume_percent = Some(stored.progress_percentage.clamp(0.0, 100.0));
        }
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.seed(&stored);
        }
        self.sync_progress();
        self.publish();
        self.emit(SessionEvent::Restored(stored));
    }

    async fn teardown(&mut self) {
        self.guard.deactivate();
        self.sampler = None;
        self.ready_deadline = None;
        self.restore = None;

        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy().await;
        }
        if let Some(reporter) = self.reporter.take() {
            if let Some(report) = reporter.close(self.services.config.flush_timeout()).await {
                self.emit(SessionEvent::ProgressReported(report));
            }
        }
        info!(session_id = %self.id, phase = %self.state.phase, "Session closed");
    }
}

async fn next_adapter_event(adapter: &mut Option<Box<dyn PlayerAdapter>>) -> AdapterEvent {
    if let Some(adapter) = adapter.as_mut() {
        if let Some(event) = adapter.next_event().await {
            return event;
        }
    }
    std::future::pending().await
}

async fn next_tick(sampler: &mut Option<Interval>) {
    match sampler {
        Some(sampler) => {
            sampler.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn telemetry_changed(telemetry: &mut watch::Receiver<TelemetrySnapshot>) {
    if telemetry.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn restored(slot: &mut Option<oneshot::Receiver<StoredProgress>>) -> StoredProgress {
    let Some(rx) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let result = rx.await;
    *slot = None;
    match result {
        Ok(stored) => stored,
        Err(_) => std::future::pending().await,
    }
}
