//! Player adapters for the three video backends
//!
//! Every backend speaks its own callback-driven API. An adapter normalizes one
//! of them into the [`PlayerAdapter`] contract:
//!
//! - `initialize` loads whatever the backend needs and constructs the player;
//!   readiness is signalled afterwards through [`AdapterEvent::Ready`]
//! - control calls are best-effort and silently dropped before ready
//! - events are pulled by the owning session in arrival order
//! - `destroy` detaches listeners and removes markup, and may be called at any time

mod embed;
mod file;
mod vimeo;
mod youtube;

pub use embed::IframeEmbedAdapter;
pub use file::FileAdapter;
pub use vimeo::VimeoAdapter;
pub use youtube::YouTubeAdapter;

use crate::descriptor::VideoDescriptor;
use crate::host::PlayerHost;
use crate::quality::QualityDecision;
use crate::{BackendKind, Error, PlaybackConfig, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Normalized backend events
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// Emitted once per successful initialization
    Ready { duration: Option<f64> },
    Play,
    Pause,
    Buffering(bool),
    /// Emitted at most once per playback of the media
    Ended,
    Error { reason: String },
}

/// How an adapter presents the video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterMode {
    /// Backend player driven through its API
    Scripted,
    /// Bare iframe with the platform's own controls
    NativeEmbed,
    /// Media element showing native controls
    NativeControls,
}

/// Liveness flag shared between a session and its pending continuations
#[derive(Debug, Clone)]
pub struct SessionGuard(Arc<AtomicBool>);

impl SessionGuard {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the session torn down; pending continuations must not touch it afterwards
    pub fn deactivate(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Fail with `SessionClosed` once the session is torn down
    pub fn check(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::SessionClosed)
        }
    }
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an adapter needs to present one video
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// Unique per-session element id the player is keyed by
    pub element_id: String,
    pub descriptor: VideoDescriptor,
    pub decision: QualityDecision,
    /// Start playback once ready
    pub autoplay: bool,
    pub config: Arc<PlaybackConfig>,
    pub guard: SessionGuard,
}

/// Uniform playback contract over one backend
#[async_trait]
pub trait PlayerAdapter: Send {
    fn backend(&self) -> BackendKind;

    fn mode(&self) -> AdapterMode;

    /// True once the adapter substituted a simpler embed on its own
    fn is_degraded(&self) -> bool;

    /// Load the backend and construct the player
    async fn initialize(&mut self) -> Result<()>;

    /// Start playback; false when the backend ignored or refused the call
    async fn play(&mut self) -> bool;

    async fn pause(&mut self);

    /// Toggle mute, returning the new muted state
    async fn toggle_mute(&mut self) -> bool;

    /// Best-known position in seconds; zero before metadata
    fn position(&self) -> f64;

    /// Duration once known
    fn duration(&self) -> Option<f64>;

    /// Apply new quality hints without interrupting playback
    async fn apply_quality(&mut self, decision: &QualityDecision);

    /// Next backend event; `None` once the adapter is destroyed
    ///
    /// Cancel-safe: dropping the future loses no event.
    async fn next_event(&mut self) -> Option<AdapterEvent>;

    /// Detach listeners and remove markup; idempotent
    async fn destroy(&mut self);

    /// Typed error for an `AdapterEvent::Error` raised by this adapter
    fn runtime_error(&self, reason: String) -> Error {
        Error::runtime(self.backend(), reason)
    }
}

/// Attribute a failure of a self-mounted embed to the script that forced it
pub(crate) fn blame_script(backend: BackendKind, script_error: Option<&str>, error: Error) -> Error {
    match (script_error, error) {
        (Some(script), Error::PlaybackRuntime { reason, .. }) => Error::ScriptLoad {
            backend,
            reason: format!("{script}; native embed: {reason}"),
        },
        (_, error) => error,
    }
}

/// Builds the adapters a session runs
pub trait AdapterFactory: Send + Sync {
    /// Adapter matching the descriptor's backend kind
    fn primary(&self, ctx: AdapterContext) -> Box<dyn PlayerAdapter>;

    /// Most compatible native embed for the descriptor's backend kind
    fn fallback(&self, ctx: AdapterContext) -> Box<dyn PlayerAdapter>;
}

impl AdapterFactory for PlayerHost {
    fn primary(&self, ctx: AdapterContext) -> Box<dyn PlayerAdapter> {
        match ctx.descriptor.backend_kind() {
            BackendKind::YouTube => Box::new(YouTubeAdapter::new(self.clone(), ctx)),
            BackendKind::Vimeo => Box::new(VimeoAdapter::new(self.clone(), ctx)),
            BackendKind::File => Box::new(FileAdapter::new(self.clone(), ctx)),
        }
    }

    fn fallback(&self, ctx: AdapterContext) -> Box<dyn PlayerAdapter> {
        match ctx.descriptor.backend_kind() {
            BackendKind::YouTube | BackendKind::Vimeo => {
                Box::new(IframeEmbedAdapter::new(self.clone(), ctx))
            }
            BackendKind::File => Box::new(FileAdapter::native_controls(self.clone(), ctx)),
        }
    }
}
