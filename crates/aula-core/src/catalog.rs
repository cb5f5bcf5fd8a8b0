//! Video catalog records served by the REST backend
//!
//! The backend stores one record per video with the source split across
//! `video_type`, `youtubeId`, `vimeoId` and `mp4_url`. Records convert into
//! [`VideoDescriptor`]s; uploads stored inline as `data:` URLs are marked
//! chunked so the file adapter streams them from the backend instead.

use crate::descriptor::{extract_vimeo_id, extract_youtube_id, VideoDescriptor};
use crate::types::{BackendKind, PlaybackConfig};
use crate::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One video as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVideo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Human-readable length, e.g. "45 min"
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(rename = "video_type")]
    pub video_type: String,
    #[serde(default)]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub vimeo_id: Option<String>,
    #[serde(default, rename = "mp4_url")]
    pub mp4_url: Option<String>,
    #[serde(default, rename = "mp4_filename")]
    pub mp4_filename: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl CatalogVideo {
    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.video_type.parse()
    }

    /// Duration in seconds parsed from the display string
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration.as_deref().and_then(parse_duration)
    }

    pub fn to_descriptor(&self) -> Result<VideoDescriptor> {
        let backend = self.backend_kind()?;
        let missing = |reference: &Option<String>| Error::InvalidVideoReference {
            backend,
            reference: reference.clone().unwrap_or_default(),
        };

        let mut descriptor = match backend {
            BackendKind::YouTube => {
                let video_id = self
                    .youtube_id
                    .as_deref()
                    .and_then(extract_youtube_id)
                    .ok_or_else(|| missing(&self.youtube_id))?;
                VideoDescriptor::youtube(&self.id, &self.title, video_id)
            }
            BackendKind::Vimeo => {
                let video_id = self
                    .vimeo_id
                    .as_deref()
                    .and_then(extract_vimeo_id)
                    .ok_or_else(|| missing(&self.vimeo_id))?;
                VideoDescriptor::vimeo(&self.id, &self.title, video_id)
            }
            BackendKind::File => {
                let reference = self
                    .mp4_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| missing(&self.mp4_url))?;
                VideoDescriptor::file(&self.id, &self.title, reference)
                    .with_chunked(reference.starts_with("data:"))
            }
        };

        if let Some(seconds) = self.duration_seconds() {
            descriptor = descriptor.with_duration_hint(seconds);
        }
        if let Some(thumbnail) = self.thumbnail.as_deref().filter(|t| !t.is_empty()) {
            descriptor = descriptor.with_thumbnail(thumbnail);
        }
        descriptor.validate()?;
        Ok(descriptor)
    }
}

impl TryFrom<&CatalogVideo> for VideoDescriptor {
    type Error = Error;

    fn try_from(video: &CatalogVideo) -> Result<Self> {
        video.to_descriptor()
    }
}

/// A category with its videos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub videos: Vec<CatalogVideo>,
}

impl Category {
    /// Playable descriptors; malformed records are skipped
    pub fn descriptors(&self) -> Vec<VideoDescriptor> {
        descriptors(&self.videos)
    }
}

fn descriptors(videos: &[CatalogVideo]) -> Vec<VideoDescriptor> {
    videos
        .iter()
        .filter_map(|video| match video.to_descriptor() {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(video_id = %video.id, error = %e, "Skipping unplayable catalog record");
                None
            }
        })
        .collect()
}

/// Parse "45 min", "1h 20min", "90s", "12:34" or "1:02:03" into seconds
pub fn parse_duration(input: &str) -> Option<f64> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    if input.contains(':') {
        let mut seconds = 0u64;
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() > 3 {
            return None;
        }
        for part in parts {
            seconds = seconds
                .checked_mul(60)?
                .checked_add(part.trim().parse::<u64>().ok()?)?;
        }
        return (seconds > 0).then_some(seconds as f64);
    }

    let mut seconds = 0.0;
    let mut number = String::new();
    let mut unit = String::new();
    let mut matched = false;

    let mut flush = |number: &mut String, unit: &mut String| -> Option<()> {
        if number.is_empty() {
            return if unit.is_empty() { Some(()) } else { None };
        }
        let value: f64 = number.parse().ok()?;
        let scale = match unit.as_str() {
            "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
            "" | "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            _ => return None,
        };
        seconds += value * scale;
        matched = true;
        number.clear();
        unit.clear();
        Some(())
    };

    for c in input.chars() {
        if c.is_ascii_digit() || c == '.' {
            if !unit.is_empty() {
                flush(&mut number, &mut unit)?;
            }
            number.push(c);
        } else if c.is_alphabetic() {
            unit.push(c);
        } else if !c.is_whitespace() {
            return None;
        }
    }
    flush(&mut number, &mut unit)?;

    (matched && seconds > 0.0).then_some(seconds)
}

/// Read-only client for the catalog endpoints
pub struct CatalogClient {
    client: Client,
    config: Arc<PlaybackConfig>,
}

impl CatalogClient {
    pub fn new(config: Arc<PlaybackConfig>) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, config })
    }

    /// `GET /api/categories`
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let url = self.config.endpoint("api/categories")?;
        let categories = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Category>>()
            .await?;
        debug!(count = categories.len(), "Categories fetched");
        Ok(categories)
    }

    /// `GET /api/videos`
    pub async fn videos(&self) -> Result<Vec<CatalogVideo>> {
        let url = self.config.endpoint("api/videos")?;
        let videos = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<CatalogVideo>>()
            .await?;
        debug!(count = videos.len(), "Videos fetched");
        Ok(videos)
    }

    /// Every playable video in the catalog
    pub async fn descriptors(&self) -> Result<Vec<VideoDescriptor>> {
        Ok(descriptors(&self.videos().await?))
    }
}
