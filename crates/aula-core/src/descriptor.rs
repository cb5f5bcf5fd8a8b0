//! Video descriptors and backend reference handling
//!
//! A [`VideoDescriptor`] is built by the calling view and never mutated by the
//! playback core. It knows how to validate its backend reference, where the video
//! lives on its original site, and how each backend embeds it.

use crate::{types::BackendKind, Error, PlaybackConfig, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Backend-specific reference to the media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "video_type", rename_all = "lowercase")]
pub enum VideoSource {
    YouTube {
        video_id: String,
    },
    Vimeo {
        video_id: String,
    },
    #[serde(rename = "mp4")]
    File {
        reference: String,
        /// Stored server-side; served through the streaming endpoint
        #[serde(default)]
        chunked: bool,
    },
}

/// Immutable description of one video to play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub source: VideoSource,
    /// Duration in seconds, when the catalog knows it
    pub duration_hint: Option<f64>,
    pub thumbnail: Option<String>,
}

impl VideoDescriptor {
    pub fn youtube(id: impl Into<String>, title: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self::new(id, title, VideoSource::YouTube { video_id: video_id.into() })
    }

    pub fn vimeo(id: impl Into<String>, title: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self::new(id, title, VideoSource::Vimeo { video_id: video_id.into() })
    }

    pub fn file(id: impl Into<String>, title: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::new(
            id,
            title,
            VideoSource::File {
                reference: reference.into(),
                chunked: false,
            },
        )
    }

    fn new(id: impl Into<String>, title: impl Into<String>, source: VideoSource) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source,
            duration_hint: None,
            thumbnail: None,
        }
    }

    /// Mark a file reference as served by the streaming endpoint
    pub fn with_chunked(mut self, value: bool) -> Self {
        if let VideoSource::File { chunked, .. } = &mut self.source {
            *chunked = value;
        }
        self
    }

    pub fn with_duration_hint(mut self, seconds: f64) -> Self {
        self.duration_hint = Some(seconds);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.source {
            VideoSource::YouTube { .. } => BackendKind::YouTube,
            VideoSource::Vimeo { .. } => BackendKind::Vimeo,
            VideoSource::File { .. } => BackendKind::File,
        }
    }

    /// Platform video id or file reference
    pub fn backend_ref(&self) -> &str {
        match &self.source {
            VideoSource::YouTube { video_id } | VideoSource::Vimeo { video_id } => video_id,
            VideoSource::File { reference, .. } => reference,
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.source, VideoSource::File { chunked: true, .. })
    }

    /// Reject references no adapter could construct a player for
    pub fn validate(&self) -> Result<()> {
        let valid = match &self.source {
            VideoSource::YouTube { video_id } => is_youtube_id(video_id),
            VideoSource::Vimeo { video_id } => is_vimeo_id(video_id),
            VideoSource::File { reference, .. } => {
                parse_file_reference(reference).is_some()
                    || (reference.starts_with('/') && reference.len() > 1)
            }
        };
        if valid {
            Ok(())
        } else {
            Err(self.invalid_reference())
        }
    }

    fn invalid_reference(&self) -> Error {
        Error::InvalidVideoReference {
            backend: self.backend_kind(),
            reference: self.backend_ref().to_string(),
        }
    }

    /// Where the video can be watched outside this platform
    pub fn external_url(&self) -> Option<Url> {
        match &self.source {
            VideoSource::YouTube { video_id } if is_youtube_id(video_id) => {
                Url::parse_with_params("https://www.youtube.com/watch", &[("v", video_id)]).ok()
            }
            VideoSource::Vimeo { video_id } if is_vimeo_id(video_id) => {
                Url::parse(&format!("https://vimeo.com/{video_id}")).ok()
            }
            VideoSource::File { reference, .. } => {
                parse_file_reference(reference).filter(|url| url.scheme() != "data")
            }
            _ => None,
        }
    }

    /// The file URL played directly, before any stream substitution
    pub fn file_url(&self, config: &PlaybackConfig) -> Result<Url> {
        match &self.source {
            VideoSource::File { reference, .. } => match parse_file_reference(reference) {
                Some(url) => Ok(url),
                None if reference.starts_with('/') => config.endpoint(reference),
                None => Err(self.invalid_reference()),
            },
            _ => Err(self.invalid_reference()),
        }
    }

    /// Streaming endpoint serving a chunked upload
    pub fn stream_url(&self, config: &PlaybackConfig) -> Result<Url> {
        config.endpoint(&format!("api/videos/{}/mp4-stream", self.id))
    }

    /// Bare iframe embed with native controls
    pub fn native_embed_url(&self, autoplay: bool) -> Option<Url> {
        let autoplay = if autoplay { "1" } else { "0" };
        match &self.source {
            VideoSource::YouTube { video_id } => Url::parse_with_params(
                &format!("https://www.youtube.com/embed/{video_id}"),
                &[
                    ("autoplay", autoplay),
                    ("controls", "1"),
                    ("rel", "0"),
                    ("modestbranding", "1"),
                ],
            )
            .ok(),
            VideoSource::Vimeo { video_id } => Url::parse_with_params(
                &format!("https://player.vimeo.com/video/{video_id}"),
                &[
                    ("autoplay", autoplay),
                    ("controls", "1"),
                    ("byline", "0"),
                    ("portrait", "0"),
                ],
            )
            .ok(),
            VideoSource::File { .. } => None,
        }
    }

    /// Thumbnail to display, downgraded for low-bandwidth viewers
    pub fn thumbnail_url(&self, low_bandwidth: bool) -> Option<String> {
        if low_bandwidth {
            match &self.source {
                VideoSource::YouTube { video_id } => {
                    return Some(format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg"))
                }
                VideoSource::Vimeo { video_id } => {
                    return Some(format!("https://i.vimeocdn.com/video/{video_id}_200x150.jpg"))
                }
                VideoSource::File { .. } => {}
            }
        }
        self.thumbnail.clone()
    }
}

fn is_youtube_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_vimeo_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 12 && id.chars().all(|c| c.is_ascii_digit())
}

fn parse_file_reference(reference: &str) -> Option<Url> {
    let url = Url::parse(reference.trim()).ok()?;
    match url.scheme() {
        "http" | "https" | "blob" => Some(url),
        "data" if url.path().starts_with("video/") => Some(url),
        _ => None,
    }
}

/// Extract a YouTube video id from a watch, short or embed URL
pub fn extract_youtube_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_youtube_id(input) {
        return Some(input.to_string());
    }
    let url = Url::parse(input).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed") | Some("shorts") | Some("v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;
    is_youtube_id(&candidate).then_some(candidate)
}

/// Extract a Vimeo video id from a page or player URL
pub fn extract_vimeo_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_vimeo_id(input) {
        return Some(input.to_string());
    }
    let url = Url::parse(input).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    if host != "vimeo.com" && host != "player.vimeo.com" {
        return None;
    }
    url.path_segments()?
        .find(|segment| is_vimeo_id(segment))
        .map(str::to_string)
}
