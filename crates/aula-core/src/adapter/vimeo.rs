//! Vimeo Player API adapter

use super::{blame_script, AdapterContext, AdapterEvent, AdapterMode, IframeEmbedAdapter, PlayerAdapter};
use crate::host::{PlayerHost, ScriptKind, VimeoPlayer, VimeoPlayerOptions, VimeoSignal};
use crate::quality::QualityDecision;
use crate::{BackendKind, Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, instrument, warn};

/// Scripted Vimeo player; degrades to a native iframe when the API is unusable
pub struct VimeoAdapter {
    host: PlayerHost,
    ctx: AdapterContext,
    player: Option<Box<dyn VimeoPlayer>>,
    signals: Option<UnboundedReceiver<VimeoSignal>>,
    embed: Option<IframeEmbedAdapter>,
    /// Why the player script never loaded, when the embed stands in for it
    script_error: Option<String>,
    slot_inserted: bool,
    /// Loaded arrived, duration not fetched yet
    pending_ready: bool,
    ready: bool,
    ended: bool,
    muted: bool,
    position: f64,
    duration: Option<f64>,
}

impl VimeoAdapter {
    pub fn new(host: PlayerHost, ctx: AdapterContext) -> Self {
        Self {
            host,
            ctx,
            player: None,
            signals: None,
            embed: None,
            script_error: None,
            slot_inserted: false,
            pending_ready: false,
            ready: false,
            ended: false,
            muted: false,
            position: 0.0,
            duration: None,
        }
    }

    fn construct(&mut self) -> anyhow::Result<()> {
        self.host.container.insert_slot(&self.ctx.element_id)?;
        self.slot_inserted = true;

        let options = VimeoPlayerOptions {
            controls: self.ctx.decision.native_controls,
            quality: self.ctx.decision.backend_hint.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let player = self.host.vimeo.create_player(
            &self.ctx.element_id,
            self.ctx.descriptor.backend_ref(),
            &options,
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

    /// Resolve a pending ready by asking the player for its duration
    async fn finish_ready(&mut self) -> Option<AdapterEvent> {
        let player = self.player.as_mut()?;
        match player.get_duration().await {
            Ok(d) if d.is_finite() && d > 0.0 => self.duration = Some(d),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Vimeo duration unavailable at ready"),
        }
        self.pending_ready = false;
        self.ready = true;
        Some(AdapterEvent::Ready {
            duration: self.duration,
        })
    }

    fn translate(&mut self, signal: VimeoSignal) -> Option<AdapterEvent> {
        match signal {
            VimeoSignal::Loaded => {
                if !self.ready {
                    self.pending_ready = true;
                }
                None
            }
            VimeoSignal::Play => {
                self.ended = false;
                Some(AdapterEvent::Play)
            }
            VimeoSignal::Pause => Some(AdapterEvent::Pause),
            VimeoSignal::BufferStart => Some(AdapterEvent::Buffering(true)),
            VimeoSignal::BufferEnd => Some(AdapterEvent::Buffering(false)),
            VimeoSignal::Ended if !self.ended => {
                self.ended = true;
                Some(AdapterEvent::Ended)
            }
            VimeoSignal::Ended => None,
            VimeoSignal::TimeUpdate { seconds, duration } => {
                self.position = seconds.max(0.0);
                if duration.is_finite() && duration > 0.0 {
                    self.duration = Some(duration);
                }
                None
            }
            VimeoSignal::Error(reason) => Some(AdapterEvent::Error { reason }),
        }
    }
}

#[async_trait]
impl PlayerAdapter for VimeoAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Vimeo
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
            .ensure_loaded(ScriptKind::VimeoPlayerApi)
            .await;
        self.ctx.guard.check()?;

        let failure = match loaded {
            Ok(()) => match self.construct() {
                Ok(()) => {
                    info!(quality = %self.ctx.decision.backend_hint, "Vimeo player constructed");
                    return Ok(());
                }
                Err(e) => e,
            },
            Err(e) => {
                self.script_error = Some(e.to_string());
                e
            }
        };

        warn!(error = %failure, "Vimeo API unusable, embedding native player");
        self.player = None;
        self.signals = None;
        self.remove_slot();

        let mut embed = IframeEmbedAdapter::new(self.host.clone(), self.ctx.clone());
        let mounted = embed.mount();
        self.embed = Some(embed);
        mounted.map_err(|e| blame_script(BackendKind::Vimeo, self.script_error.as_deref(), e))
    }

    async fn play(&mut self) -> bool {
        if let Some(embed) = self.embed.as_mut() {
            return embed.play().await;
        }
        let Some(player) = self.player.as_mut().filter(|_| self.ready) else {
            debug!("Play ignored before ready");
            return false;
        };
        match player.play().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Vimeo play rejected");
                false
            }
        }
    }

    async fn pause(&mut self) {
        if let Some(player) = self.player.as_mut().filter(|_| self.ready) {
            if let Err(e) = player.pause().await {
                warn!(error = %e, "Vimeo pause rejected");
            }
        }
    }

    async fn toggle_mute(&mut self) -> bool {
        if let Some(player) = self.player.as_mut().filter(|_| self.ready) {
            match player.set_muted(!self.muted).await {
                Ok(()) => self.muted = !self.muted,
                Err(e) => warn!(error = %e, "Vimeo mute rejected"),
            }
        }
        self.muted
    }

    fn position(&self) -> f64 {
        match self.duration {
            Some(d) => self.position.min(d),
            None => self.position,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    async fn apply_quality(&mut self, decision: &QualityDecision) {
        self.ctx.decision = decision.clone();
        if let Some(player) = self.player.as_mut().filter(|_| self.ready) {
            match player.set_quality(&decision.backend_hint).await {
                Ok(()) => debug!(quality = %decision.backend_hint, "Vimeo quality applied"),
                // Quality selection needs a Plus account or higher on the video owner's side
                Err(e) => debug!(error = %e, "Vimeo quality change refused"),
            }
        }
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        if let Some(embed) = self.embed.as_mut() {
            return embed.next_event().await;
        }
        loop {
            if self.pending_ready {
                return self.finish_ready().await;
            }
            let signal = self.signals.as_mut()?.recv().await?;
            if let Some(event) = self.translate(signal) {
                return Some(event);
            }
        }
    }

    async fn destroy(&mut self) {
        self.signals = None;
        self.pending_ready = false;
        if let Some(mut player) = self.player.take() {
            if let Err(e) = player.destroy().await {
                debug!(error = %e, "Vimeo player destroy failed");
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{adapter_context, MockHost};
    use crate::VideoDescriptor;

    fn descriptor() -> VideoDescriptor {
        VideoDescriptor::vimeo("v2", "Intro", "76979871")
    }

    #[tokio::test]
    async fn test_ready_carries_fetched_duration() {
        let mock = MockHost::new();
        mock.vimeo.set_duration(300.0);
        let mut adapter = VimeoAdapter::new(mock.host(), adapter_context(descriptor()));
        adapter.initialize().await.unwrap();
        assert_eq!(mock.vimeo.last_options().unwrap().quality, "1080");

        mock.vimeo.signal(VimeoSignal::Loaded);
        mock.vimeo.signal(VimeoSignal::Loaded);
        mock.vimeo.signal(VimeoSignal::TimeUpdate {
            seconds: 12.5,
            duration: 300.0,
        });
        mock.vimeo.signal(VimeoSignal::Ended);
        mock.vimeo.signal(VimeoSignal::Ended);

        assert_eq!(
            adapter.next_event().await,
            Some(AdapterEvent::Ready { duration: Some(300.0) })
        );
        assert_eq!(adapter.next_event().await, Some(AdapterEvent::Ended));
        assert_eq!(adapter.position(), 12.5);
    }

    #[tokio::test]
    async fn test_controls_after_ready() {
        let mock = MockHost::new();
        let mut adapter = VimeoAdapter::new(mock.host(), adapter_context(descriptor()));
        adapter.initialize().await.unwrap();

        assert!(!adapter.play().await);
        assert!(!adapter.toggle_mute().await);
        assert_eq!(mock.vimeo.plays(), 0);

        mock.vimeo.signal(VimeoSignal::Loaded);
        adapter.next_event().await;
        assert!(adapter.play().await);
        assert!(adapter.toggle_mute().await);
        assert_eq!(mock.vimeo.plays(), 1);
    }

    #[tokio::test]
    async fn test_script_failure_degrades_to_iframe() {
        let mock = MockHost::new();
        mock.injector.fail(ScriptKind::VimeoPlayerApi, true);
        let mut adapter = VimeoAdapter::new(mock.host(), adapter_context(descriptor()));

        adapter.initialize().await.unwrap();
        assert!(adapter.is_degraded());
        assert_eq!(mock.vimeo.created(), 0);
        assert_eq!(mock.container.frame_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_reference_rejected() {
        let mock = MockHost::new();
        let bad = VideoDescriptor::vimeo("v2", "Intro", "not-a-number");
        let mut adapter = VimeoAdapter::new(mock.host(), adapter_context(bad));
        let err = adapter.initialize().await.unwrap_err();
        assert!(!err.is_recoverable());
        assert_eq!(mock.injector.injections(ScriptKind::VimeoPlayerApi), 0);
    }
}
