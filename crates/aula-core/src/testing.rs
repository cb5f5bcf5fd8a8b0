//! Host doubles for unit tests
//!
//! Signals sent before a player or frame exists are queued and delivered when
//! it is created, so tests can script a backend before the session builds it.

use crate::adapter::{AdapterContext, SessionGuard};
use crate::host::*;
use crate::loader::ScriptLoader;
use crate::progress::{ProgressReport, ProgressSink, StoredProgress};
use crate::quality::QualityPolicy;
use crate::telemetry::*;
use crate::types::{ConnectionTier, PlaybackConfig, Preload, QualityPreference};
use crate::{Error, Result, VideoDescriptor};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// Route test logs through the libtest writer
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("aula_core=debug")
        .try_init();
}

/// Adapter context with fast-desktop hints for the descriptor's backend
pub(crate) fn adapter_context(descriptor: VideoDescriptor) -> AdapterContext {
    let decision = QualityPolicy::new().decide(
        &TelemetrySnapshot::with_connection(ConnectionTier::Fast),
        descriptor.backend_kind(),
        QualityPreference::Auto,
    );
    AdapterContext {
        element_id: "aula-player-test".to_string(),
        descriptor,
        decision,
        autoplay: false,
        config: Arc::new(PlaybackConfig::default()),
        guard: SessionGuard::new(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Script injection

#[derive(Default)]
pub(crate) struct MockInjector {
    delay: Duration,
    failing: Mutex<HashSet<ScriptKind>>,
    counts: Mutex<HashMap<ScriptKind, usize>>,
}

impl MockInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail(&self, kind: ScriptKind, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    pub fn injections(&self, kind: ScriptKind) -> usize {
        lock(&self.counts).get(&kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ScriptInjector for MockInjector {
    async fn inject(&self, kind: ScriptKind) -> anyhow::Result<()> {
        *lock(&self.counts).entry(kind).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if lock(&self.failing).contains(&kind) {
            anyhow::bail!("{} blocked by the network", kind.src());
        }
        Ok(())
    }
}

// Container

#[derive(Default)]
struct ContainerState {
    slots: HashSet<String>,
    frames: HashMap<String, UnboundedSender<FrameSignal>>,
    frame_sources: Vec<Url>,
    last_frame: Option<String>,
    queued: Vec<FrameSignal>,
    removals: usize,
    fail_frames: bool,
}

#[derive(Default)]
pub(crate) struct MockContainer {
    state: Mutex<ContainerState>,
}

impl MockContainer {
    pub fn slot_count(&self) -> usize {
        lock(&self.state).slots.len()
    }

    /// Frames currently mounted
    pub fn frame_count(&self) -> usize {
        lock(&self.state).frames.len()
    }

    /// Frames ever mounted
    pub fn frames_inserted(&self) -> usize {
        lock(&self.state).frame_sources.len()
    }

    pub fn last_frame_src(&self) -> Option<Url> {
        lock(&self.state).frame_sources.last().cloned()
    }

    pub fn removals(&self) -> usize {
        lock(&self.state).removals
    }

    pub fn fail_frames(&self, failing: bool) {
        lock(&self.state).fail_frames = failing;
    }

    /// Signal the most recent frame, or queue for the next one
    pub fn signal_frame(&self, signal: FrameSignal) {
        let mut state = lock(&self.state);
        let target = state
            .last_frame
            .as_ref()
            .and_then(|id| state.frames.get(id))
            .cloned();
        match target {
            Some(tx) => {
                let _ = tx.send(signal);
            }
            None => state.queued.push(signal),
        }
    }
}

impl Container for MockContainer {
    fn insert_slot(&self, element_id: &str) -> anyhow::Result<()> {
        lock(&self.state).slots.insert(element_id.to_string());
        Ok(())
    }

    fn insert_frame(
        &self,
        element_id: &str,
        src: &Url,
        signals: UnboundedSender<FrameSignal>,
    ) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_frames {
            anyhow::bail!("frame blocked");
        }
        for signal in state.queued.drain(..) {
            let _ = signals.send(signal);
        }
        state.frames.insert(element_id.to_string(), signals);
        state.frame_sources.push(src.clone());
        state.last_frame = Some(element_id.to_string());
        Ok(())
    }

    fn remove(&self, element_id: &str) {
        let mut state = lock(&self.state);
        let slot = state.slots.remove(element_id);
        let frame = state.frames.remove(element_id).is_some();
        if slot || frame {
            state.removals += 1;
        }
    }
}

// YouTube

#[derive(Default)]
struct YouTubeState {
    created: usize,
    destroyed: usize,
    plays: usize,
    pauses: usize,
    muted: bool,
    current_time: f64,
    duration: f64,
    quality: Option<String>,
    last_vars: Option<YouTubePlayerVars>,
    sender: Option<UnboundedSender<YouTubeSignal>>,
    queued: Vec<YouTubeSignal>,
    fail_create: bool,
}

#[derive(Default)]
pub(crate) struct MockYouTubeApi {
    state: Arc<Mutex<YouTubeState>>,
}

impl MockYouTubeApi {
    pub fn signal(&self, signal: YouTubeSignal) {
        let mut state = lock(&self.state);
        match &state.sender {
            Some(tx) => {
                let _ = tx.send(signal);
            }
            None => state.queued.push(signal),
        }
    }

    pub fn set_duration(&self, seconds: f64) {
        lock(&self.state).duration = seconds;
    }

    pub fn set_current_time(&self, seconds: f64) {
        lock(&self.state).current_time = seconds;
    }

    pub fn fail_create(&self, failing: bool) {
        lock(&self.state).fail_create = failing;
    }

    pub fn created(&self) -> usize {
        lock(&self.state).created
    }

    pub fn destroyed(&self) -> usize {
        lock(&self.state).destroyed
    }

    pub fn plays(&self) -> usize {
        lock(&self.state).plays
    }

    pub fn pauses(&self) -> usize {
        lock(&self.state).pauses
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    pub fn quality(&self) -> Option<String> {
        lock(&self.state).quality.clone()
    }

    pub fn last_vars(&self) -> Option<YouTubePlayerVars> {
        lock(&self.state).last_vars.clone()
    }
}

impl YouTubeApi for MockYouTubeApi {
    fn create_player(
        &self,
        _element_id: &str,
        _video_id: &str,
        vars: &YouTubePlayerVars,
        signals: UnboundedSender<YouTubeSignal>,
    ) -> anyhow::Result<Box<dyn YouTubePlayer>> {
        let mut state = lock(&self.state);
        if state.fail_create {
            anyhow::bail!("YT.Player is not a constructor");
        }
        state.created += 1;
        state.last_vars = Some(vars.clone());
        state.quality = Some(vars.quality.clone());
        for signal in state.queued.drain(..) {
            let _ = signals.send(signal);
        }
        state.sender = Some(signals);
        Ok(Box::new(MockYouTubePlayer {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockYouTubePlayer {
    state: Arc<Mutex<YouTubeState>>,
}

impl YouTubePlayer for MockYouTubePlayer {
    fn play_video(&mut self) {
        lock(&self.state).plays += 1;
    }

    fn pause_video(&mut self) {
        lock(&self.state).pauses += 1;
    }

    fn mute(&mut self) {
        lock(&self.state).muted = true;
    }

    fn un_mute(&mut self) {
        lock(&self.state).muted = false;
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn set_playback_quality(&mut self, token: &str) {
        lock(&self.state).quality = Some(token.to_string());
    }

    fn destroy(&mut self) {
        let mut state = lock(&self.state);
        state.destroyed += 1;
        state.sender = None;
    }
}

// Vimeo

#[derive(Default)]
struct VimeoState {
    created: usize,
    destroyed: usize,
    plays: usize,
    muted: bool,
    duration: f64,
    quality: Option<String>,
    last_options: Option<VimeoPlayerOptions>,
    sender: Option<UnboundedSender<VimeoSignal>>,
    queued: Vec<VimeoSignal>,
}

#[derive(Default)]
pub(crate) struct MockVimeoApi {
    state: Arc<Mutex<VimeoState>>,
}

impl MockVimeoApi {
    pub fn signal(&self, signal: VimeoSignal) {
        let mut state = lock(&self.state);
        match &state.sender {
            Some(tx) => {
                let _ = tx.send(signal);
            }
            None => state.queued.push(signal),
        }
    }

    pub fn set_duration(&self, seconds: f64) {
        lock(&self.state).duration = seconds;
    }

    pub fn created(&self) -> usize {
        lock(&self.state).created
    }

    pub fn destroyed(&self) -> usize {
        lock(&self.state).destroyed
    }

    pub fn plays(&self) -> usize {
        lock(&self.state).plays
    }

    pub fn quality(&self) -> Option<String> {
        lock(&self.state).quality.clone()
    }

    pub fn last_options(&self) -> Option<VimeoPlayerOptions> {
        lock(&self.state).last_options.clone()
    }
}

impl VimeoApi for MockVimeoApi {
    fn create_player(
        &self,
        _element_id: &str,
        _video_id: &str,
        options: &VimeoPlayerOptions,
        signals: UnboundedSender<VimeoSignal>,
    ) -> anyhow::Result<Box<dyn VimeoPlayer>> {
        let mut state = lock(&self.state);
        state.created += 1;
        state.last_options = Some(options.clone());
        state.quality = Some(options.quality.clone());
        for signal in state.queued.drain(..) {
            let _ = signals.send(signal);
        }
        state.sender = Some(signals);
        Ok(Box::new(MockVimeoPlayer {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockVimeoPlayer {
    state: Arc<Mutex<VimeoState>>,
}

#[async_trait]
impl VimeoPlayer for MockVimeoPlayer {
    async fn play(&mut self) -> anyhow::Result<()> {
        lock(&self.state).plays += 1;
        Ok(())
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()> {
        lock(&self.state).muted = muted;
        Ok(())
    }

    async fn get_duration(&mut self) -> anyhow::Result<f64> {
        Ok(lock(&self.state).duration)
    }

    async fn set_quality(&mut self, token: &str) -> anyhow::Result<()> {
        lock(&self.state).quality = Some(token.to_string());
        Ok(())
    }

    async fn destroy(&mut self) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        state.destroyed += 1;
        state.sender = None;
        Ok(())
    }
}

// Media elements

#[derive(Default)]
struct MediaState {
    sources: Vec<String>,
    last_options: Option<MediaElementOptions>,
    preload: Option<Preload>,
    current_time: f64,
    duration: Option<f64>,
    plays: usize,
    refuse_play: bool,
    removed: usize,
    sender: Option<UnboundedSender<MediaSignal>>,
    queued: Vec<MediaSignal>,
}

#[derive(Default)]
pub(crate) struct MockMediaFactory {
    state: Arc<Mutex<MediaState>>,
}

impl MockMediaFactory {
    pub fn signal(&self, signal: MediaSignal) {
        let mut state = lock(&self.state);
        match &state.sender {
            Some(tx) => {
                let _ = tx.send(signal);
            }
            None => state.queued.push(signal),
        }
    }

    pub fn set_current_time(&self, seconds: f64) {
        lock(&self.state).current_time = seconds;
    }

    pub fn sources(&self) -> Vec<String> {
        lock(&self.state).sources.clone()
    }

    pub fn last_options(&self) -> Option<MediaElementOptions> {
        lock(&self.state).last_options.clone()
    }

    pub fn preload(&self) -> Option<Preload> {
        lock(&self.state).preload
    }

    pub fn plays(&self) -> usize {
        lock(&self.state).plays
    }

    /// Reject `play()` the way a browser blocks autoplay
    pub fn refuse_play(&self, refusing: bool) {
        lock(&self.state).refuse_play = refusing;
    }

    pub fn removed(&self) -> usize {
        lock(&self.state).removed
    }
}

impl MediaElementFactory for MockMediaFactory {
    fn create(
        &self,
        _element_id: &str,
        options: &MediaElementOptions,
        signals: UnboundedSender<MediaSignal>,
    ) -> anyhow::Result<Box<dyn MediaElement>> {
        let mut state = lock(&self.state);
        state.last_options = Some(options.clone());
        state.preload = Some(options.preload);
        for signal in state.queued.drain(..) {
            let _ = signals.send(signal);
        }
        state.sender = Some(signals);
        Ok(Box::new(MockMediaElement {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockMediaElement {
    state: Arc<Mutex<MediaState>>,
}

#[async_trait]
impl MediaElement for MockMediaElement {
    fn set_source(&mut self, src: &Url) {
        lock(&self.state).sources.push(src.to_string());
    }

    fn set_preload(&mut self, preload: Preload) {
        lock(&self.state).preload = Some(preload);
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.refuse_play {
            anyhow::bail!("NotAllowedError: play() requires a user gesture");
        }
        state.plays += 1;
        Ok(())
    }

    fn pause(&mut self) {}

    fn set_muted(&mut self, _muted: bool) {}

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state).duration
    }

    fn remove(&mut self) {
        let mut state = lock(&self.state);
        state.removed += 1;
        state.sender = None;
    }
}

/// Full set of host doubles sharing one script registry
pub(crate) struct MockHost {
    pub container: Arc<MockContainer>,
    pub injector: Arc<MockInjector>,
    pub youtube: Arc<MockYouTubeApi>,
    pub vimeo: Arc<MockVimeoApi>,
    pub media: Arc<MockMediaFactory>,
    scripts: Arc<ScriptLoader>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::with_injector(MockInjector::new())
    }

    pub fn with_injector(injector: MockInjector) -> Self {
        let injector = Arc::new(injector);
        Self {
            container: Arc::new(MockContainer::default()),
            scripts: Arc::new(ScriptLoader::new(injector.clone())),
            injector,
            youtube: Arc::new(MockYouTubeApi::default()),
            vimeo: Arc::new(MockVimeoApi::default()),
            media: Arc::new(MockMediaFactory::default()),
        }
    }

    pub fn host(&self) -> PlayerHost {
        PlayerHost {
            container: self.container.clone(),
            scripts: self.scripts.clone(),
            youtube: self.youtube.clone(),
            vimeo: self.vimeo.clone(),
            media: self.media.clone(),
        }
    }
}

// Progress service

#[derive(Default)]
pub(crate) struct RecordingSink {
    reports: Mutex<Vec<ProgressReport>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    stored: Mutex<HashMap<(String, String), StoredProgress>>,
    fetch_delay: Duration,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn store(&self, user_email: &str, video_id: &str, progress: StoredProgress) {
        lock(&self.stored).insert((user_email.to_string(), video_id.to_string()), progress);
    }

    /// Reports delivered successfully, in order
    pub fn reports(&self) -> Vec<ProgressReport> {
        lock(&self.reports).clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn send(&self, report: &ProgressReport) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ProgressDelivery("connection refused".into()));
        }
        lock(&self.reports).push(report.clone());
        Ok(())
    }

    async fn fetch(&self, user_email: &str, video_id: &str) -> Result<Option<StoredProgress>> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        Ok(lock(&self.stored)
            .get(&(user_email.to_string(), video_id.to_string()))
            .cloned())
    }
}

// Telemetry

pub(crate) struct MockTelemetryHost {
    user_agent: Option<String>,
    viewport_width: Option<u32>,
    network: Option<NetworkInformation>,
    battery: Option<BatteryStatus>,
    supports_listeners: bool,
    listeners: Mutex<HashMap<u64, (HostSignalKind, HostListener)>>,
    next_id: AtomicU64,
}

impl MockTelemetryHost {
    /// Host exposing no optional API at all
    pub fn bare() -> Self {
        Self {
            user_agent: None,
            viewport_width: None,
            network: None,
            battery: None,
            supports_listeners: false,
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Desktop browser on a fast connection with a healthy battery
    pub fn desktop() -> Self {
        Self {
            user_agent: Some(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36"
                    .to_string(),
            ),
            viewport_width: Some(1920),
            network: Some(NetworkInformation {
                effective_type: EffectiveConnectionType::G4,
                downlink_mbps: Some(25.0),
                rtt_ms: Some(40),
                save_data: false,
            }),
            battery: Some(BatteryStatus {
                level: 0.8,
                charging: false,
            }),
            supports_listeners: true,
            ..Self::bare()
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Deliver a host event to every listener registered for its kind
    pub fn emit(&self, signal: HostSignal) {
        let kind = match signal {
            HostSignal::Resize { .. } => HostSignalKind::Resize,
            HostSignal::ConnectionChange(_) => HostSignalKind::ConnectionChange,
            HostSignal::BatteryChange(_) => HostSignalKind::BatteryChange,
        };
        let targets: Vec<HostListener> = lock(&self.listeners)
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in targets {
            listener(signal.clone());
        }
    }
}

#[async_trait]
impl TelemetryHost for MockTelemetryHost {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn viewport_width(&self) -> Option<u32> {
        self.viewport_width
    }

    fn network_information(&self) -> Option<NetworkInformation> {
        self.network.clone()
    }

    async fn battery_status(&self) -> Option<BatteryStatus> {
        self.battery
    }

    fn add_listener(&self, kind: HostSignalKind, listener: HostListener) -> Option<ListenerId> {
        if !self.supports_listeners {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).insert(id, (kind, listener));
        Some(ListenerId(id))
    }

    fn remove_listener(&self, id: ListenerId) {
        lock(&self.listeners).remove(&id.0);
    }
}
