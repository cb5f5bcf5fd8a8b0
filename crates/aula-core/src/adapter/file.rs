//! Direct file adapter over a native media element
//!
//! Chunked uploads are served by the streaming endpoint; when the stream errors
//! the adapter switches the element back to the raw reference once.

use super::{AdapterContext, AdapterEvent, AdapterMode, PlayerAdapter};
use crate::host::{MediaElement, MediaElementOptions, MediaSignal, PlayerHost};
use crate::quality::QualityDecision;
use crate::{BackendKind, Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Seconds from the end within which a pause is the element finishing
const END_TOLERANCE: f64 = 0.25;

pub struct FileAdapter {
    host: PlayerHost,
    ctx: AdapterContext,
    mode: AdapterMode,
    element: Option<Box<dyn MediaElement>>,
    signals: Option<UnboundedReceiver<MediaSignal>>,
    /// Raw reference kept for a stream fallback
    raw_source: Option<Url>,
    streaming: bool,
    ready: bool,
    buffering: bool,
    ended: bool,
    muted: bool,
    duration: Option<f64>,
}

impl FileAdapter {
    /// Custom-controls player, streaming chunked uploads
    pub fn new(host: PlayerHost, ctx: AdapterContext) -> Self {
        Self::with_mode(host, ctx, AdapterMode::Scripted)
    }

    /// Plain element with native controls playing the raw reference
    pub fn native_controls(host: PlayerHost, ctx: AdapterContext) -> Self {
        Self::with_mode(host, ctx, AdapterMode::NativeControls)
    }

    fn with_mode(host: PlayerHost, ctx: AdapterContext, mode: AdapterMode) -> Self {
        Self {
            host,
            ctx,
            mode,
            element: None,
            signals: None,
            raw_source: None,
            streaming: false,
            ready: false,
            buffering: false,
            ended: false,
            muted: false,
            duration: None,
        }
    }

    fn at_end(&self) -> bool {
        match (self.element.as_ref(), self.duration()) {
            (Some(element), Some(duration)) => element.current_time() >= duration - END_TOLERANCE,
            _ => false,
        }
    }

    /// Swap a failed stream for the raw reference; false when nothing is left to try
    fn fall_back_to_raw(&mut self, reason: &str) -> bool {
        if !self.streaming {
            return false;
        }
        let (Some(element), Some(raw)) = (self.element.as_mut(), self.raw_source.as_ref()) else {
            return false;
        };
        warn!(%reason, src = %raw, "Stream endpoint failed, playing raw reference");
        element.set_source(raw);
        self.streaming = false;
        true
    }

    fn translate(&mut self, signal: MediaSignal) -> Option<AdapterEvent> {
        match signal {
            MediaSignal::LoadedMetadata { duration } => {
                if duration.is_finite() && duration > 0.0 {
                    self.duration = Some(duration);
                }
                if self.ready {
                    return None;
                }
                self.ready = true;
                Some(AdapterEvent::Ready {
                    duration: self.duration,
                })
            }
            MediaSignal::DurationChange(duration) => {
                if duration.is_finite() && duration > 0.0 {
                    self.duration = Some(duration);
                }
                None
            }
            MediaSignal::Play => {
                self.ended = false;
                Some(AdapterEvent::Play)
            }
            MediaSignal::Playing if self.buffering => {
                self.buffering = false;
                Some(AdapterEvent::Buffering(false))
            }
            MediaSignal::Playing => None,
            // The element pauses right before it reports the end
            MediaSignal::Pause if self.at_end() => None,
            MediaSignal::Pause => Some(AdapterEvent::Pause),
            MediaSignal::Waiting if !self.buffering => {
                self.buffering = true;
                Some(AdapterEvent::Buffering(true))
            }
            MediaSignal::Waiting => None,
            MediaSignal::Ended if !self.ended => {
                self.ended = true;
                self.buffering = false;
                Some(AdapterEvent::Ended)
            }
            MediaSignal::Ended => None,
            MediaSignal::Error(reason) => {
                if self.fall_back_to_raw(&reason) {
                    None
                } else {
                    Some(AdapterEvent::Error { reason })
                }
            }
        }
    }
}

#[async_trait]
impl PlayerAdapter for FileAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::File
    }

    fn mode(&self) -> AdapterMode {
        self.mode
    }

    fn is_degraded(&self) -> bool {
        self.mode == AdapterMode::NativeControls
            || (self.ctx.descriptor.is_chunked() && !self.streaming && self.element.is_some())
    }

    #[instrument(skip(self), fields(element_id = %self.ctx.element_id))]
    async fn initialize(&mut self) -> Result<()> {
        self.ctx.guard.check()?;
        self.ctx.descriptor.validate()?;

        let raw = self.ctx.descriptor.file_url(&self.ctx.config)?;
        let streaming = self.mode == AdapterMode::Scripted && self.ctx.descriptor.is_chunked();
        let source = if streaming {
            self.ctx.descriptor.stream_url(&self.ctx.config)?
        } else {
            raw.clone()
        };

        let options = MediaElementOptions {
            preload: self.ctx.decision.preload,
            controls: self.mode == AdapterMode::NativeControls || self.ctx.decision.native_controls,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let mut element = self
            .host
            .media
            .create(&self.ctx.element_id, &options, tx)
            .map_err(|e| Error::runtime(BackendKind::File, format!("media element unavailable: {e}")))?;
        element.set_source(&source);

        info!(src = %source, streaming, preload = %options.preload, "Media element created");
        self.element = Some(element);
        self.signals = Some(rx);
        self.raw_source = Some(raw);
        self.streaming = streaming;
        Ok(())
    }

    async fn play(&mut self) -> bool {
        let Some(element) = self.element.as_mut().filter(|_| self.ready) else {
            debug!("Play ignored before metadata");
            return false;
        };
        match element.play().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Media element refused to play");
                false
            }
        }
    }

    async fn pause(&mut self) {
        if let Some(element) = self.element.as_mut().filter(|_| self.ready) {
            element.pause();
        }
    }

    async fn toggle_mute(&mut self) -> bool {
        if let Some(element) = self.element.as_mut().filter(|_| self.ready) {
            self.muted = !self.muted;
            element.set_muted(self.muted);
        }
        self.muted
    }

    fn position(&self) -> f64 {
        let position = self
            .element
            .as_ref()
            .map(|e| e.current_time().max(0.0))
            .unwrap_or(0.0);
        match self.duration() {
            Some(d) => position.min(d),
            None => position,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration.or_else(|| {
            self.element
                .as_ref()
                .and_then(|e| e.duration())
                .filter(|d| d.is_finite() && *d > 0.0)
        })
    }

    async fn apply_quality(&mut self, decision: &QualityDecision) {
        self.ctx.decision = decision.clone();
        if let Some(element) = self.element.as_mut() {
            element.set_preload(decision.preload);
            debug!(preload = %decision.preload, "Media preload applied");
        }
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        loop {
            let signal = self.signals.as_mut()?.recv().await?;
            if let Some(event) = self.translate(signal) {
                return Some(event);
            }
        }
    }

    async fn destroy(&mut self) {
        self.signals = None;
        if let Some(mut element) = self.element.take() {
            element.remove();
            debug!(element_id = %self.ctx.element_id, "Media element removed");
        }
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{adapter_context, MockHost};
    use crate::VideoDescriptor;

    #[tokio::test]
    async fn test_chunked_upload_streams_then_falls_back() {
        let mock = MockHost::new();
        let descriptor =
            VideoDescriptor::file("vid-9", "Upload", "data:video/mp4;base64,AAAA").with_chunked(true);
        let mut adapter = FileAdapter::new(mock.host(), adapter_context(descriptor));
        adapter.initialize().await.unwrap();

        assert_eq!(
            mock.media.sources(),
            vec!["http://localhost:8001/api/videos/vid-9/mp4-stream".to_string()]
        );
        assert!(!adapter.is_degraded());

        mock.media.signal(MediaSignal::Error("stream 500".into()));
        mock.media.signal(MediaSignal::LoadedMetadata { duration: 42.0 });
        assert_eq!(
            adapter.next_event().await,
            Some(AdapterEvent::Ready { duration: Some(42.0) })
        );
        assert_eq!(mock.media.sources().len(), 2);
        assert!(mock.media.sources()[1].starts_with("data:video/mp4"));
        assert!(adapter.is_degraded());

        mock.media.signal(MediaSignal::Error("decode".into()));
        assert!(matches!(adapter.next_event().await, Some(AdapterEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_relative_reference_resolved_against_api() {
        let mock = MockHost::new();
        let descriptor = VideoDescriptor::file("vid-3", "Upload", "/uploads/intro.mp4");
        let mut adapter = FileAdapter::new(mock.host(), adapter_context(descriptor));
        adapter.initialize().await.unwrap();
        assert_eq!(
            mock.media.sources(),
            vec!["http://localhost:8001/uploads/intro.mp4".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pause_at_end_is_folded_into_ended() {
        let mock = MockHost::new();
        let descriptor = VideoDescriptor::file("vid-1", "Clip", "https://cdn.example.com/clip.mp4");
        let mut adapter = FileAdapter::new(mock.host(), adapter_context(descriptor));
        adapter.initialize().await.unwrap();

        mock.media.signal(MediaSignal::LoadedMetadata { duration: 30.0 });
        mock.media.signal(MediaSignal::Play);
        mock.media.signal(MediaSignal::Waiting);
        mock.media.signal(MediaSignal::Playing);
        assert!(matches!(adapter.next_event().await, Some(AdapterEvent::Ready { .. })));
        assert_eq!(adapter.next_event().await, Some(AdapterEvent::Play));
        assert_eq!(adapter.next_event().await, Some(AdapterEvent::Buffering(true)));
        assert_eq!(adapter.next_event().await, Some(AdapterEvent::Buffering(false)));

        mock.media.set_current_time(30.0);
        mock.media.signal(MediaSignal::Pause);
        mock.media.signal(MediaSignal::Ended);
        mock.media.signal(MediaSignal::Ended);
        assert_eq!(adapter.next_event().await, Some(AdapterEvent::Ended));
        assert_eq!(adapter.position(), 30.0);
    }

    #[tokio::test]
    async fn test_native_controls_use_raw_reference() {
        let mock = MockHost::new();
        let descriptor =
            VideoDescriptor::file("vid-9", "Upload", "https://cdn.example.com/a.mp4").with_chunked(true);
        let mut adapter = FileAdapter::native_controls(mock.host(), adapter_context(descriptor));
        adapter.initialize().await.unwrap();

        assert_eq!(adapter.mode(), AdapterMode::NativeControls);
        assert!(adapter.is_degraded());
        assert_eq!(mock.media.sources(), vec!["https://cdn.example.com/a.mp4".to_string()]);
        assert!(mock.media.last_options().unwrap().controls);

        adapter.destroy().await;
        adapter.destroy().await;
        assert_eq!(mock.media.removed(), 1);
    }
}
