//! Error types for Aula Core

use crate::types::BackendKind;
use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback error types
#[derive(Error, Debug)]
pub enum Error {
    // Telemetry errors
    #[error("Telemetry signal unavailable: {signal}")]
    TelemetryUnavailable { signal: &'static str },

    // Adapter errors
    #[error("Failed to load {backend} player script: {reason}")]
    ScriptLoad { backend: BackendKind, reason: String },

    #[error("{backend} player did not become ready within {waited_ms}ms")]
    InitTimeout { backend: BackendKind, waited_ms: u64 },

    #[error("{backend} playback failed: {reason}")]
    PlaybackRuntime { backend: BackendKind, reason: String },

    #[error("Invalid video reference for {backend}: {reference:?}")]
    InvalidVideoReference { backend: BackendKind, reference: String },

    // Progress errors
    #[error("Failed to deliver progress report: {0}")]
    ProgressDelivery(String),

    // Session errors
    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Playback session closed")]
    SessionClosed,

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a runtime playback error
    pub fn runtime(backend: BackendKind, reason: impl Into<String>) -> Self {
        Error::PlaybackRuntime {
            backend,
            reason: reason.into(),
        }
    }

    /// Returns true if a fallback adapter may absorb this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ScriptLoad { .. } | Error::InitTimeout { .. } | Error::PlaybackRuntime { .. }
        )
    }

    /// Returns the error code reported alongside a failed session
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::TelemetryUnavailable { .. } => "TELEMETRY_UNAVAILABLE",
            Error::ScriptLoad { .. } => "SCRIPT_LOAD",
            Error::InitTimeout { .. } => "INIT_TIMEOUT",
            Error::PlaybackRuntime { .. } => "PLAYBACK_RUNTIME",
            Error::InvalidVideoReference { .. } => "INVALID_REFERENCE",
            Error::ProgressDelivery(_) => "PROGRESS_DELIVERY",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::Network(_) => "NETWORK",
            Error::Serialization(_) => "SERIALIZATION",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}
