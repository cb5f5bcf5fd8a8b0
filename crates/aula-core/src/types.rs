//! Core types for Aula playback

use crate::quality::QualityDecision;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// DOM element id reserved for this session's player
    pub fn element_id(&self) -> String {
        format!("aula-player-{}", self.0.simple())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External video delivery mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// YouTube IFrame player
    #[serde(rename = "youtube")]
    YouTube,
    /// Vimeo player
    #[serde(rename = "vimeo")]
    Vimeo,
    /// Direct file streamed into a media element
    #[serde(rename = "mp4")]
    File,
}

impl BackendKind {
    /// Whether this backend needs a third-party script before a player can exist
    pub fn needs_script(&self) -> bool {
        matches!(self, BackendKind::YouTube | BackendKind::Vimeo)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::YouTube => write!(f, "youtube"),
            BackendKind::Vimeo => write!(f, "vimeo"),
            BackendKind::File => write!(f, "mp4"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(BackendKind::YouTube),
            "vimeo" => Ok(BackendKind::Vimeo),
            "mp4" | "file" => Ok(BackendKind::File),
            other => Err(Error::InvalidConfig(format!("unknown video type: {other}"))),
        }
    }
}

/// Discrete quality tier, ordered from most to least restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl QualityTier {
    /// All tiers from lowest to highest
    pub const ALL: [QualityTier; 5] = [
        QualityTier::P240,
        QualityTier::P360,
        QualityTier::P480,
        QualityTier::P720,
        QualityTier::P1080,
    ];

    /// Vertical resolution in pixels
    pub fn height(&self) -> u32 {
        match self {
            QualityTier::P240 => 240,
            QualityTier::P360 => 360,
            QualityTier::P480 => 480,
            QualityTier::P720 => 720,
            QualityTier::P1080 => 1080,
        }
    }

    /// Tier label, e.g. "720p"
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::P240 => "240p",
            QualityTier::P360 => "360p",
            QualityTier::P480 => "480p",
            QualityTier::P720 => "720p",
            QualityTier::P1080 => "1080p",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let digits = normalized.trim_end_matches('p');
        QualityTier::ALL
            .into_iter()
            .find(|tier| tier.height().to_string() == digits)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown quality tier: {s}")))
    }
}

/// Media preload strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    Metadata,
    Auto,
}

impl std::fmt::Display for Preload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preload::None => write!(f, "none"),
            Preload::Metadata => write!(f, "metadata"),
            Preload::Auto => write!(f, "auto"),
        }
    }
}

/// Coarse network quality class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionTier {
    Fast,
    Medium,
    Slow,
}

impl std::fmt::Display for ConnectionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionTier::Fast => write!(f, "fast"),
            ConnectionTier::Medium => write!(f, "medium"),
            ConnectionTier::Slow => write!(f, "slow"),
        }
    }
}

/// Playback session state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No video started
    Idle,
    /// Adapter is loading its backend
    Initializing,
    /// Backend reported ready, waiting for play
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Stalled while playing
    Buffering,
    /// Playback reached the end
    Ended,
    /// Adapter failed
    Errored,
}

impl PlaybackPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        matches!(
            (self, target),
            // From Idle (a malformed reference fails before any adapter exists)
            (Idle, Initializing) | (Idle, Errored) |
            // From Initializing
            (Initializing, Ready) | (Initializing, Errored) |
            // From Ready
            (Ready, Playing) | (Ready, Errored) |
            // From Playing
            (Playing, Paused) | (Playing, Buffering) | (Playing, Ended) | (Playing, Errored) |
            // From Paused
            (Paused, Playing) | (Paused, Errored) |
            // From Buffering
            (Buffering, Playing) | (Buffering, Paused) | (Buffering, Ended) | (Buffering, Errored) |
            // From Errored, only through a fallback adapter
            (Errored, Initializing)
        )
    }

    /// Phases in which an adapter exists and may emit events
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackPhase::Initializing
                | PlaybackPhase::Ready
                | PlaybackPhase::Playing
                | PlaybackPhase::Paused
                | PlaybackPhase::Buffering
        )
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Initializing => write!(f, "initializing"),
            PlaybackPhase::Ready => write!(f, "ready"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Paused => write!(f, "paused"),
            PlaybackPhase::Buffering => write!(f, "buffering"),
            PlaybackPhase::Ended => write!(f, "ended"),
            PlaybackPhase::Errored => write!(f, "errored"),
        }
    }
}

/// Failure details exposed to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// No further fallback will be attempted
    pub permanent: bool,
    /// Where the video can still be watched
    pub external_url: Option<Url>,
}

impl ErrorInfo {
    pub fn from_error(error: &Error, permanent: bool, external_url: Option<Url>) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            permanent,
            external_url,
        }
    }
}

/// Playback state owned by one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    /// Current position in seconds
    pub position_seconds: f64,
    /// Content duration once known
    pub duration_seconds: Option<f64>,
    pub is_muted: bool,
    /// Latest locally computed progress (0-100)
    pub progress_percent: f64,
    /// Highest progress sent to the tracking service
    pub last_reported_progress_percent: f64,
    /// Sticky completion flag
    pub completed: bool,
    /// Progress restored from a previous viewing
    pub resume_percent: Option<f64>,
    /// Quality decision currently applied
    pub quality: Option<QualityDecision>,
    /// A fallback adapter is in use
    pub fallback_active: bool,
    pub error: Option<ErrorInfo>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            position_seconds: 0.0,
            duration_seconds: None,
            is_muted: false,
            progress_percent: 0.0,
            last_reported_progress_percent: 0.0,
            completed: false,
            resume_percent: None,
            quality: None,
            fallback_active: false,
            error: None,
        }
    }
}

/// Progress percentage clamped to [0, 100]; zero while duration is unknown
pub fn progress_percent(position: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d > 0.0 && position.is_finite() => (position / d * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Quality selection requested by the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    /// Derive the tier from telemetry
    #[default]
    Auto,
    /// Pin a tier
    Fixed(QualityTier),
}

/// Per-session options supplied by the calling view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Viewer identity for progress tracking (no reporting when absent)
    pub user_email: Option<String>,
    /// Start playing as soon as ready, if the quality policy allows it
    pub autoplay: bool,
    pub quality: QualityPreference,
    /// Fetch previously stored progress on start
    pub restore_progress: bool,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Base URL of the REST backend
    pub api_base_url: Url,
    /// Bounded wait for the adapter's ready signal (milliseconds)
    pub init_timeout_ms: u64,
    /// Position sampling interval while playing (milliseconds)
    pub sample_interval_ms: u64,
    /// Watched time between progress reports (milliseconds)
    pub report_interval_ms: u64,
    /// Watched time between progress reports in low-bandwidth mode (milliseconds)
    pub low_bandwidth_report_interval_ms: u64,
    /// Progress percentage at which a video counts as completed
    pub completion_threshold: f64,
    /// HTTP request timeout (milliseconds)
    pub request_timeout_ms: u64,
    /// Time allowed to deliver queued reports on teardown (milliseconds)
    pub flush_timeout_ms: u64,
    /// Viewport width at or below which a device is compact (pixels)
    pub compact_viewport_max: u32,
    /// Battery percentage below which power saving kicks in
    pub low_battery_percent: u8,
    /// Battery percentage below which compact devices go low-bandwidth
    pub compact_low_battery_percent: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            init_timeout_ms: 5000,
            sample_interval_ms: 1000,
            report_interval_ms: 10_000,
            low_bandwidth_report_interval_ms: 15_000,
            completion_threshold: 90.0,
            request_timeout_ms: 10_000,
            flush_timeout_ms: 2000,
            compact_viewport_max: 768,
            low_battery_percent: 20,
            compact_low_battery_percent: 30,
        }
    }
}

fn default_api_base() -> Url {
    Url::parse("http://localhost:8001/").expect("default API base URL is valid")
}

impl PlaybackConfig {
    /// Config tuned for constrained networks: sparser sampling and reporting
    pub fn low_bandwidth() -> Self {
        Self {
            init_timeout_ms: 8000,
            sample_interval_ms: 2000,
            report_interval_ms: 15_000,
            low_bandwidth_report_interval_ms: 30_000,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlaybackConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "api_base_url must be http(s): {}",
                self.api_base_url
            )));
        }
        for (name, value) in [
            ("init_timeout_ms", self.init_timeout_ms),
            ("sample_interval_ms", self.sample_interval_ms),
            ("report_interval_ms", self.report_interval_ms),
            ("low_bandwidth_report_interval_ms", self.low_bandwidth_report_interval_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if !(self.completion_threshold > 0.0 && self.completion_threshold <= 100.0) {
            return Err(Error::InvalidConfig(format!(
                "completion_threshold out of range: {}",
                self.completion_threshold
            )));
        }
        Ok(())
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Report cadence for the given bandwidth mode
    pub fn report_interval(&self, low_bandwidth: bool) -> Duration {
        if low_bandwidth {
            Duration::from_millis(self.low_bandwidth_report_interval_ms)
        } else {
            Duration::from_millis(self.report_interval_ms)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Resolve an API path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidConfig(format!("bad endpoint {path}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing() {
        assert_eq!("720p".parse::<QualityTier>().unwrap(), QualityTier::P720);
        assert_eq!("1080".parse::<QualityTier>().unwrap(), QualityTier::P1080);
        assert!("4k".parse::<QualityTier>().is_err());
        assert!(QualityTier::P240 < QualityTier::P1080);
    }

    #[test]
    fn test_progress_percent_clamped() {
        assert_eq!(progress_percent(30.0, Some(60.0)), 50.0);
        assert_eq!(progress_percent(70.0, Some(60.0)), 100.0);
        assert_eq!(progress_percent(-1.0, Some(60.0)), 0.0);
        assert_eq!(progress_percent(10.0, None), 0.0);
        assert_eq!(progress_percent(10.0, Some(0.0)), 0.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(PlaybackConfig::default().validate().is_ok());
        assert!(PlaybackConfig::low_bandwidth().validate().is_ok());

        let config = PlaybackConfig {
            sample_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = PlaybackConfig {
            completion_threshold: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config =
            PlaybackConfig::from_json(r#"{"api_base_url": "https://api.aula.training/"}"#).unwrap();
        assert_eq!(config.init_timeout_ms, 5000);
        assert_eq!(
            config.endpoint("/api/video-progress").unwrap().as_str(),
            "https://api.aula.training/api/video-progress"
        );
        assert!(PlaybackConfig::from_json(r#"{"api_base_url": "ftp://x/"}"#).is_err());
    }

    #[test]
    fn test_element_ids_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a.element_id(), b.element_id());
        assert!(a.element_id().starts_with("aula-player-"));
    }
}
