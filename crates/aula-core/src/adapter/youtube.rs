//! YouTube IFrame API adapter

use super::{blame_script, AdapterContext, AdapterEvent, AdapterMode, IframeEmbedAdapter, PlayerAdapter};
use crate::host::{PlayerHost, ScriptKind, YouTubePlayer, YouTubePlayerVars, YouTubeSignal};
use crate::quality::QualityDecision;
use crate::{BackendKind, Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, instrument, warn};

/// Scripted YouTube player; degrades to a native iframe when the API is unusable
pub struct YouTubeAdapter {
    host: PlayerHost,
    ctx: AdapterContext,
    player: Option<Box<dyn YouTubePlayer>>,
    signals: Option<UnboundedReceiver<YouTubeSignal>>,
    embed: Option<IframeEmbedAdapter>,
    /// Why the player script never loaded, when the embed stands in for it
    script_error: Option<String>,
    slot_inserted: bool,
    ready: bool,
    buffering: bool,
    ended: bool,
    muted: bool,
}

impl YouTubeAdapter {
    pub fn new(host: PlayerHost, ctx: AdapterContext) -> Self {
        Self {
            host,
            ctx,
            player: None,
            signals: None,
            embed: None,
            script_error: None,
            slot_inserted: false,
            ready: false,
            buffering: false,
            ended: false,
            muted: false,
        }
    }

    fn construct(&mut self) -> anyhow::Result<()> {
        self.host.container.insert_slot(&self.ctx.element_id)?;
        self.slot_inserted = true;

        let vars = YouTubePlayerVars {
            controls: self.ctx.decision.native_controls,
            quality: self.ctx.decision.backend_hint.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let player = self.host.youtube.create_player(
            &self.ctx.element_id,
            self.ctx.descriptor.backend_ref(),
            &vars,
            tx,
        )?;

        self.player = Some(player);
        self.signals = Some(rx);
        Ok(())
    }

    fn remove_slot(&mut self) {
        if std::mem::take(&mut self.slot_inserted) {
            self.host.container.remove(&self.ctx.element_id);
        }
    }

    fn translate(&mut self, signal: YouTubeSignal) -> Option<AdapterEvent> {
        match signal {
            YouTubeSignal::Ready => {
                if self.ready {
                    return None;
                }
                self.ready = true;
                let duration = self.duration();
                Some(AdapterEvent::Ready { duration })
            }
            YouTubeSignal::StateChange(code) => match code {
                1 => {
                    self.ended = false;
                    if std::mem::take(&mut self.buffering) {
                        Some(AdapterEvent::Buffering(false))
                    } else {
                        Some(AdapterEvent::Play)
                    }
                }
                2 => {
                    self.buffering = false;
                    Some(AdapterEvent::Pause)
                }
                3 if !self.buffering => {
                    self.buffering = true;
                    Some(AdapterEvent::Buffering(true))
                }
                0 if !self.ended => {
                    self.ended = true;
                    self.buffering = false;
                    Some(AdapterEvent::Ended)
                }
                _ => None,
            },
            YouTubeSignal::Error(code) => Some(AdapterEvent::Error {
                reason: error_reason(code).to_string(),
            }),
        }
    }
}

fn error_reason(code: i32) -> &'static str {
    match code {
        2 => "invalid video id",
        5 => "html5 player error",
        100 => "video not found or private",
        101 | 150 => "embedding disabled by the owner",
        _ => "unknown player error",
    }
}

#[async_trait]
impl PlayerAdapter for YouTubeAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::YouTube
    }

    fn mode(&self) -> AdapterMode {
        if self.embed.is_some() {
            AdapterMode::NativeEmbed
        } else {
            AdapterMode::Scripted
        }
    }

    fn is_degraded(&self) -> bool {
        self.embed.is_some()
    }

    #[instrument(skip(self), fields(element_id = %self.ctx.element_id))]
    async fn initialize(&mut self) -> Result<()> {
        self.ctx.descriptor.validate()?;

        let loaded = self
            .host
            .scripts
            .ensure_loaded(ScriptKind::YouTubeIframeApi)
            .await;
        self.ctx.guard.check()?;

        let failure = match loaded {
            Ok(()) => match self.construct() {
                Ok(()) => {
                    info!(quality = %self.ctx.decision.backend_hint, "YouTube player constructed");
                    return Ok(());
                }
                Err(e) => e,
            },
            Err(e) => {
                self.script_error = Some(e.to_string());
                e
            }
        };

        warn!(error = %failure, "YouTube API unusable, embedding native player");
        self.player = None;
        self.signals = None;
        self.remove_slot();

        let mut embed = IframeEmbedAdapter::new(self.host.clone(), self.ctx.clone());
        let mounted = embed.mount();
        self.embed = Some(embed);
        mounted.map_err(|e| blame_script(BackendKind::YouTube, self.script_error.as_deref(), e))
    }

    async fn play(&mut self) -> bool {
        if let Some(embed) = self.embed.as_mut() {
            return embed.play().await;
        }
        match self.player.as_mut() {
            Some(player) if self.ready => {
                player.play_video();
                true
            }
            _ => {
                debug!("Play ignored before ready");
                false
            }
        }
    }

    async fn pause(&mut self) {
        if let Some(player) = self.player.as_mut().filter(|_| self.ready) {
            player.pause_video();
        }
    }

    async fn toggle_mute(&mut self) -> bool {
        if let Some(player) = self.player.as_mut().filter(|_| self.ready) {
            self.muted = !self.muted;
            if self.muted {
                player.mute();
            } else {
                player.un_mute();
            }
        }
        self.muted
    }

    fn position(&self) -> f64 {
        match &self.player {
            Some(player) if self.ready => player.current_time().max(0.0),
            _ => 0.0,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.player
            .as_ref()
            .map(|p| p.duration())
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    async fn apply_quality(&mut self, decision: &QualityDecision) {
        self.ctx.decision = decision.clone();
        if let Some(player) = self.player.as_mut().filter(|_| self.ready) {
            player.set_playback_quality(&decision.backend_hint);
            debug!(quality = %decision.backend_hint, "YouTube quality applied");
        }
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        if let Some(embed) = self.embed.as_mut() {
            return embed.next_event().await;
        }
        loop {
            let signal = self.signals.as_mut()?.recv().await?;
            if let Some(event) = self.translate(signal) {
                return Some(event);
            }
        }
    }

    async fn destroy(&mut self) {
        self.signals = None;
        if let Some(mut player) = self.player.take() {
            player.destroy();
        }
        if let Some(embed) = self.embed.as_mut() {
            embed.destroy().await;
        }
        self.remove_slot();
        self.ready = false;
    }

    fn runtime_error(&self, reason: String) -> Error {
        blame_script(
            self.backend(),
            self.script_error.as_deref(),
            Error::runtime(self.backend(), reason),
        )
    }
}
