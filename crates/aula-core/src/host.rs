//! Host environment seams
//!
//! Everything the adapters touch outside the crate goes through these traits:
//! the page container, script injection, the two platform player APIs and
//! native media elements. Host calls return [`anyhow::Result`] because their
//! failures are opaque; adapters convert them into typed errors.
//!
//! Host callbacks are delivered over unbounded channels handed to the host at
//! construction time. Dropping the receiving side detaches the listener.

use crate::loader::ScriptLoader;
use crate::types::Preload;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// Third-party player scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    YouTubeIframeApi,
    VimeoPlayerApi,
}

impl ScriptKind {
    pub fn src(&self) -> &'static str {
        match self {
            ScriptKind::YouTubeIframeApi => "https://www.youtube.com/iframe_api",
            ScriptKind::VimeoPlayerApi => "https://player.vimeo.com/api/player.js",
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptKind::YouTubeIframeApi => write!(f, "youtube-iframe-api"),
            ScriptKind::VimeoPlayerApi => write!(f, "vimeo-player-api"),
        }
    }
}

/// Injects a script tag and resolves once it has loaded
#[async_trait]
pub trait ScriptInjector: Send + Sync {
    async fn inject(&self, kind: ScriptKind) -> anyhow::Result<()>;
}

/// Load outcome of an embedded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSignal {
    Loaded,
    Failed,
}

/// Page region that hosts one session's player markup
pub trait Container: Send + Sync {
    /// Insert an empty element a scripted player will take over
    fn insert_slot(&self, element_id: &str) -> anyhow::Result<()>;

    /// Insert an iframe with native controls
    fn insert_frame(
        &self,
        element_id: &str,
        src: &Url,
        signals: UnboundedSender<FrameSignal>,
    ) -> anyhow::Result<()>;

    /// Remove an element; unknown ids are ignored
    fn remove(&self, element_id: &str);
}

/// `playerVars` of a scripted YouTube player
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubePlayerVars {
    pub controls: bool,
    pub quality: String,
}

/// Callbacks of a YouTube player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeSignal {
    Ready,
    /// Player state code: -1 unstarted, 0 ended, 1 playing, 2 paused, 3 buffering, 5 cued
    StateChange(i32),
    /// Error code: 2 invalid id, 5 html5 error, 100 not found, 101/150 embedding refused
    Error(i32),
}

/// YouTube IFrame API entry point
pub trait YouTubeApi: Send + Sync {
    fn create_player(
        &self,
        element_id: &str,
        video_id: &str,
        vars: &YouTubePlayerVars,
        signals: UnboundedSender<YouTubeSignal>,
    ) -> anyhow::Result<Box<dyn YouTubePlayer>>;
}

/// Scripted YouTube player
pub trait YouTubePlayer: Send {
    fn play_video(&mut self);
    fn pause_video(&mut self);
    fn mute(&mut self);
    fn un_mute(&mut self);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn set_playback_quality(&mut self, token: &str);
    fn destroy(&mut self);
}

/// Options of a scripted Vimeo player
#[derive(Debug, Clone, PartialEq)]
pub struct VimeoPlayerOptions {
    pub controls: bool,
    pub quality: String,
}

/// Callbacks of a Vimeo player
#[derive(Debug, Clone, PartialEq)]
pub enum VimeoSignal {
    Loaded,
    Play,
    Pause,
    BufferStart,
    BufferEnd,
    Ended,
    TimeUpdate { seconds: f64, duration: f64 },
    Error(String),
}

/// Vimeo Player API entry point
pub trait VimeoApi: Send + Sync {
    fn create_player(
        &self,
        element_id: &str,
        video_id: &str,
        options: &VimeoPlayerOptions,
        signals: UnboundedSender<VimeoSignal>,
    ) -> anyhow::Result<Box<dyn VimeoPlayer>>;
}

/// Scripted Vimeo player; every call is asynchronous
#[async_trait]
pub trait VimeoPlayer: Send {
    async fn play(&mut self) -> anyhow::Result<()>;
    async fn pause(&mut self) -> anyhow::Result<()>;
    async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()>;
    async fn get_duration(&mut self) -> anyhow::Result<f64>;
    async fn set_quality(&mut self, token: &str) -> anyhow::Result<()>;
    async fn destroy(&mut self) -> anyhow::Result<()>;
}

/// Events of a native media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSignal {
    LoadedMetadata { duration: f64 },
    DurationChange(f64),
    Play,
    Playing,
    Pause,
    Waiting,
    Ended,
    Error(String),
}

/// Attributes of a native media element
#[derive(Debug, Clone, PartialEq)]
pub struct MediaElementOptions {
    pub preload: Preload,
    pub controls: bool,
}

/// Creates native media elements inside the container
pub trait MediaElementFactory: Send + Sync {
    fn create(
        &self,
        element_id: &str,
        options: &MediaElementOptions,
        signals: UnboundedSender<MediaSignal>,
    ) -> anyhow::Result<Box<dyn MediaElement>>;
}

/// Native media element
#[async_trait]
pub trait MediaElement: Send {
    fn set_source(&mut self, src: &Url);
    fn set_preload(&mut self, preload: Preload);
    /// Resolves once playback actually started
    async fn play(&mut self) -> anyhow::Result<()>;
    fn pause(&mut self);
    fn set_muted(&mut self, muted: bool);
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    /// Detach listeners and remove the element
    fn remove(&mut self);
}

/// Bundle of host collaborators handed to adapters
#[derive(Clone)]
pub struct PlayerHost {
    pub container: Arc<dyn Container>,
    pub scripts: Arc<ScriptLoader>,
    pub youtube: Arc<dyn YouTubeApi>,
    pub vimeo: Arc<dyn VimeoApi>,
    pub media: Arc<dyn MediaElementFactory>,
}
