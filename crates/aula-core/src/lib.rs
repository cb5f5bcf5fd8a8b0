//! Aula Core - Adaptive Playback for Aula Training
//!
//! This crate provides the core functionality for video playback:
//! - Device and network telemetry with live change notifications
//! - Quality policy mapping telemetry to tiers and backend hints
//! - Uniform player adapters over YouTube, Vimeo and direct files
//! - Playback session state machine with a single native fallback
//! - Throttled progress reporting to the tracking service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Aula Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Telemetry   │─▶│   Quality    │  │   Catalog    │           │
//! │  │    Source    │  │    Policy    │  │    Client    │           │
//! │  └──────────────┘  └──────┬───────┘  └──────┬───────┘           │
//! │                           │                 │ descriptors       │
//! │                    ┌──────┴─────────────────┴┐                  │
//! │                    │     Playback Session    │◀── commands      │
//! │                    │     (state machine)     │──▶ state/events  │
//! │                    └──────┬───────────┬──────┘                  │
//! │                           │           │                         │
//! │  ┌────────────────────────┴──┐  ┌─────┴────────┐                │
//! │  │      Player Adapters      │  │   Progress   │                │
//! │  │ youtube │ vimeo │ mp4 │ ⌂ │  │   Reporter   │                │
//! │  └────────────┬──────────────┘  └──────────────┘                │
//! │        ┌──────┴──────┐                                          │
//! │        │ Player Host │ scripts, container, platform APIs        │
//! │        └─────────────┘                                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod descriptor;
pub mod telemetry;
pub mod quality;
pub mod loader;
pub mod host;
pub mod adapter;
pub mod progress;
pub mod session;
pub mod manager;
pub mod catalog;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use types::*;
pub use descriptor::{extract_vimeo_id, extract_youtube_id, VideoDescriptor, VideoSource};
pub use telemetry::{TelemetryHost, TelemetrySnapshot, TelemetrySource, TelemetryThresholds};
pub use quality::{QualityDecision, QualityPolicy, QualityTokens};
pub use loader::ScriptLoader;
pub use host::PlayerHost;
pub use adapter::{AdapterEvent, AdapterFactory, AdapterMode, PlayerAdapter};
pub use progress::{HttpProgressSink, ProgressReport, ProgressReporter, ProgressSink, StoredProgress};
pub use session::{PlaybackSession, SessionEvent, SessionServices};
pub use manager::SessionManager;
pub use catalog::{CatalogClient, CatalogVideo, Category};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the playback library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Aula Core initialized");
}
