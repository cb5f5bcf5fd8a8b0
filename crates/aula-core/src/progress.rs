//! Progress tracking and reporting
//!
//! The reporter accumulates watched time from the session's sampler and
//! forwards a snapshot to the progress service once the cadence is reached,
//! when the completion threshold is first crossed, when playback ends, and on
//! teardown if anything is still unreported.
//!
//! Delivery is best-effort: reports are queued to a background worker and
//! failures are logged and dropped. The next scheduled report supersedes a
//! lost one.

use crate::types::PlaybackConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Body of `POST /api/video-progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub user_email: String,
    pub video_id: String,
    /// 0-100, never lower than a previous report of the same session
    pub progress_percentage: f64,
    /// Whole seconds into the video
    pub watch_time: u64,
    pub completed: bool,
}

/// Progress stored by the service for one viewer and video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredProgress {
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub watch_time: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub last_watched: Option<String>,
}

impl StoredProgress {
    /// When the video was last watched; the service may omit the offset
    pub fn last_watched_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_watched.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

/// External progress-tracking collaborator
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(&self, report: &ProgressReport) -> Result<()>;

    /// Last stored progress; `None` when nothing is stored
    async fn fetch(&self, user_email: &str, video_id: &str) -> Result<Option<StoredProgress>>;
}

/// Progress service over HTTP
pub struct HttpProgressSink {
    client: Client,
    config: Arc<PlaybackConfig>,
}

impl HttpProgressSink {
    pub fn new(config: Arc<PlaybackConfig>) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ProgressSink for HttpProgressSink {
    async fn send(&self, report: &ProgressReport) -> Result<()> {
        let url = self.config.endpoint("api/video-progress")?;
        self.client
            .post(url)
            .json(report)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::ProgressDelivery(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, user_email: &str, video_id: &str) -> Result<Option<StoredProgress>> {
        let mut url = self.config.endpoint("api/video-progress")?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("{} cannot be a base URL", self.config.api_base_url)))?
            .push(user_email)
            .push(video_id);

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let stored = response.error_for_status()?.json::<StoredProgress>().await?;
        Ok(Some(stored))
    }
}

/// Per-session progress tracker with throttled delivery
pub struct ProgressReporter {
    video_id: String,
    user_email: Option<String>,
    completion_threshold: f64,
    normal_cadence: Duration,
    low_bandwidth_cadence: Duration,
    low_bandwidth: bool,
    /// Watched time since the last report
    unreported: Duration,
    dirty: bool,
    last_position: f64,
    current_percent: f64,
    last_reported_percent: f64,
    completed: bool,
    tx: Option<mpsc::UnboundedSender<ProgressReport>>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Tracker without delivery; reports are computed but not sent
    pub fn new(video_id: impl Into<String>, config: &PlaybackConfig, low_bandwidth: bool) -> Self {
        Self {
            video_id: video_id.into(),
            user_email: None,
            completion_threshold: config.completion_threshold,
            normal_cadence: config.report_interval(false),
            low_bandwidth_cadence: config.report_interval(true),
            low_bandwidth,
            unreported: Duration::ZERO,
            dirty: false,
            last_position: 0.0,
            current_percent: 0.0,
            last_reported_percent: 0.0,
            completed: false,
            tx: None,
            worker: None,
        }
    }

    /// Deliver reports for `user_email` through a background worker
    pub fn with_delivery(mut self, sink: Arc<dyn ProgressSink>, user_email: impl Into<String>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressReport>();

        let worker = tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                match sink.send(&report).await {
                    Ok(()) => debug!(
                        video_id = %report.video_id,
                        percent = report.progress_percentage,
                        "Progress delivered"
                    ),
                    Err(e) => warn!(
                        video_id = %report.video_id,
                        error = %e,
                        "Progress report dropped"
                    ),
                }
            }
        });

        self.user_email = Some(user_email.into());
        self.tx = Some(tx);
        self.worker = Some(worker);
        self
    }

    /// Current report cadence in watched time
    pub fn cadence(&self) -> Duration {
        if self.low_bandwidth {
            self.low_bandwidth_cadence
        } else {
            self.normal_cadence
        }
    }

    pub fn set_low_bandwidth(&mut self, low_bandwidth: bool) {
        self.low_bandwidth = low_bandwidth;
    }

    /// Carry over a stored completion; completion never reverts
    pub fn seed(&mut self, stored: &StoredProgress) {
        if stored.completed {
            self.completed = true;
        }
    }

    pub fn last_reported_percent(&self) -> f64 {
        self.last_reported_percent
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Whether progress was observed since the last report
    pub fn has_unreported(&self) -> bool {
        self.dirty
    }

    /// Record one sampling tick of watched time
    pub fn record(&mut self, watched: Duration, position: f64, percent: f64) -> Option<ProgressReport> {
        self.unreported += watched;
        self.dirty = true;
        self.last_position = position;
        self.current_percent = percent;

        let crossed_threshold = !self.completed && percent >= self.completion_threshold;
        if crossed_threshold || self.unreported >= self.cadence() {
            Some(self.report(position, percent))
        } else {
            None
        }
    }

    /// Final report at the end of the media
    pub fn finish(&mut self, position: f64) -> ProgressReport {
        self.completed = true;
        self.current_percent = 100.0;
        self.report(position, 100.0)
    }

    fn report(&mut self, position: f64, percent: f64) -> ProgressReport {
        let reported = self.last_reported_percent.max(percent.clamp(0.0, 100.0));
        if reported >= self.completion_threshold {
            self.completed = true;
        }
        self.last_reported_percent = reported;
        self.unreported = Duration::ZERO;
        self.dirty = false;

        let report = ProgressReport {
            user_email: self.user_email.clone().unwrap_or_default(),
            video_id: self.video_id.clone(),
            progress_percentage: reported,
            watch_time: position.max(0.0).floor() as u64,
            completed: self.completed,
        };

        match &self.tx {
            Some(tx) if tx.send(report.clone()).is_ok() => {}
            Some(_) => warn!(video_id = %self.video_id, "Progress worker gone, report dropped"),
            None => debug!(video_id = %self.video_id, "No viewer, progress not delivered"),
        }
        info!(
            video_id = %self.video_id,
            percent = report.progress_percentage,
            watch_time = report.watch_time,
            completed = report.completed,
            "Progress reported"
        );
        report
    }

    /// Report anything unreported and give queued reports a bounded time to go out
    pub async fn close(mut self, flush_timeout: Duration) -> Option<ProgressReport> {
        let last = if self.dirty {
            Some(self.report(self.last_position, self.current_percent))
        } else {
            None
        };

        self.tx = None;
        if let Some(mut worker) = self.worker.take() {
            if tokio::time::timeout(flush_timeout, &mut worker).await.is_err() {
                warn!(video_id = %self.video_id, "Progress flush timed out");
                worker.abort();
            }
        }
        last
    }
}
