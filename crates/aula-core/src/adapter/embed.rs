//! Bare iframe embed with the platform's native controls
//!
//! Needs no third-party script, so it is the most compatible way to present a
//! hosted video. The platform keeps its own controls: control calls are no-ops
//! and position stays unknown.

use super::{AdapterContext, AdapterEvent, AdapterMode, PlayerAdapter};
use crate::host::{FrameSignal, PlayerHost};
use crate::quality::QualityDecision;
use crate::{BackendKind, Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info};

/// Native-controls iframe for a YouTube or Vimeo video
pub struct IframeEmbedAdapter {
    host: PlayerHost,
    ctx: AdapterContext,
    signals: Option<UnboundedReceiver<FrameSignal>>,
    mounted: bool,
    ready_emitted: bool,
}

impl IframeEmbedAdapter {
    pub fn new(host: PlayerHost, ctx: AdapterContext) -> Self {
        Self {
            host,
            ctx,
            signals: None,
            mounted: false,
            ready_emitted: false,
        }
    }

    /// Insert the frame keyed by the session's element id
    pub(crate) fn mount(&mut self) -> Result<()> {
        let backend = self.backend();
        let src = self.ctx.descriptor.native_embed_url(self.ctx.autoplay).ok_or_else(|| {
            Error::InvalidVideoReference {
                backend,
                reference: self.ctx.descriptor.backend_ref().to_string(),
            }
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.host
            .container
            .insert_frame(&self.ctx.element_id, &src, tx)
            .map_err(|e| Error::runtime(backend, format!("frame insertion failed: {e}")))?;

        self.mounted = true;
        self.signals = Some(rx);
        info!(element_id = %self.ctx.element_id, %src, "Native embed mounted");
        Ok(())
    }
}

#[async_trait]
impl PlayerAdapter for IframeEmbedAdapter {
    fn backend(&self) -> BackendKind {
        self.ctx.descriptor.backend_kind()
    }

    fn mode(&self) -> AdapterMode {
        AdapterMode::NativeEmbed
    }

    fn is_degraded(&self) -> bool {
        true
    }

    async fn initialize(&mut self) -> Result<()> {
        self.ctx.guard.check()?;
        self.mount()
    }

    async fn play(&mut self) -> bool {
        debug!("Native embed controls its own playback");
        false
    }

    async fn pause(&mut self) {}

    async fn toggle_mute(&mut self) -> bool {
        false
    }

    fn position(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    async fn apply_quality(&mut self, decision: &QualityDecision) {
        self.ctx.decision = decision.clone();
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        loop {
            let signal = self.signals.as_mut()?.recv().await?;
            match signal {
                FrameSignal::Loaded if !self.ready_emitted => {
                    self.ready_emitted = true;
                    return Some(AdapterEvent::Ready { duration: None });
                }
                FrameSignal::Loaded => continue,
                FrameSignal::Failed => {
                    return Some(AdapterEvent::Error {
                        reason: "embedded frame failed to load".to_string(),
                    })
                }
            }
        }
    }

    async fn destroy(&mut self) {
        self.signals = None;
        if std::mem::take(&mut self.mounted) {
            self.host.container.remove(&self.ctx.element_id);
            debug!(element_id = %self.ctx.element_id, "Native embed removed");
        }
    }
}
