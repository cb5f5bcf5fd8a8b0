//! Quality Policy
//!
//! Maps a [`TelemetrySnapshot`] to a discrete [`QualityTier`] plus the
//! backend-specific hints an adapter needs: preload strategy, autoplay
//! eligibility and the backend-native quality token.
//!
//! Tier selection, most restrictive first:
//! - power saving: 240p
//! - slow connection: 240p
//! - medium connection: 360p on compact devices, 480p otherwise
//! - fast connection: 720p on compact devices, 1080p otherwise

use crate::telemetry::TelemetrySnapshot;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Playback hints derived from telemetry for one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDecision {
    pub tier: QualityTier,
    pub preload: Preload,
    pub allow_autoplay: bool,
    pub low_bandwidth_mode: bool,
    /// Compact devices get the platform's native controls
    pub native_controls: bool,
    /// Backend-native quality token
    pub backend_hint: String,
}

/// Backend-native quality tokens
pub trait QualityTokens {
    /// Token for a tier, if the backend has one
    fn token(&self, tier: QualityTier) -> Option<&'static str>;

    /// Token letting the backend pick on its own
    fn auto_token(&self) -> &'static str;

    fn hint(&self, tier: QualityTier) -> &'static str {
        self.token(tier).unwrap_or_else(|| self.auto_token())
    }
}

impl QualityTokens for BackendKind {
    fn token(&self, tier: QualityTier) -> Option<&'static str> {
        match self {
            BackendKind::YouTube => Some(match tier {
                QualityTier::P240 => "small",
                QualityTier::P360 => "medium",
                QualityTier::P480 => "large",
                QualityTier::P720 => "hd720",
                QualityTier::P1080 => "hd1080",
            }),
            BackendKind::Vimeo => Some(match tier {
                QualityTier::P240 => "240",
                QualityTier::P360 => "360",
                QualityTier::P480 => "480",
                QualityTier::P720 => "720",
                QualityTier::P1080 => "1080",
            }),
            // Media elements expose no quality switch; only preload applies
            BackendKind::File => None,
        }
    }

    fn auto_token(&self) -> &'static str {
        match self {
            BackendKind::YouTube => "default",
            BackendKind::Vimeo | BackendKind::File => "auto",
        }
    }
}

/// Pure mapping from telemetry to playback hints
#[derive(Debug, Clone, Copy)]
pub struct QualityPolicy {
    /// Battery percentage below which compact devices go low-bandwidth
    pub compact_low_battery_percent: u8,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for QualityPolicy {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            compact_low_battery_percent: config.compact_low_battery_percent,
        }
    }
}

impl QualityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether playback should relax autoplay, preload and reporting
    pub fn low_bandwidth_mode(&self, snapshot: &TelemetrySnapshot) -> bool {
        snapshot.connection_tier == ConnectionTier::Slow
            || snapshot.power_saving
            || snapshot.data_saver_requested
            || (snapshot.is_compact_device
                && snapshot
                    .battery_percent
                    .map(|p| p < self.compact_low_battery_percent)
                    .unwrap_or(false))
    }

    /// Tier telemetry allows, before any viewer preference
    pub fn select_tier(&self, snapshot: &TelemetrySnapshot) -> QualityTier {
        if snapshot.power_saving {
            return QualityTier::P240;
        }
        match (snapshot.connection_tier, snapshot.is_compact_device) {
            (ConnectionTier::Slow, _) => QualityTier::P240,
            (ConnectionTier::Medium, true) => QualityTier::P360,
            (ConnectionTier::Medium, false) => QualityTier::P480,
            (ConnectionTier::Fast, true) => QualityTier::P720,
            (ConnectionTier::Fast, false) => QualityTier::P1080,
        }
    }

    /// Derive the decision for one backend
    #[instrument(skip(self, snapshot))]
    pub fn decide(
        &self,
        snapshot: &TelemetrySnapshot,
        backend: BackendKind,
        preference: QualityPreference,
    ) -> QualityDecision {
        let low_bandwidth_mode = self.low_bandwidth_mode(snapshot);
        let tier = match preference {
            QualityPreference::Auto => self.select_tier(snapshot),
            QualityPreference::Fixed(tier) => tier,
        };

        let decision = QualityDecision {
            tier,
            preload: if low_bandwidth_mode {
                Preload::Metadata
            } else {
                Preload::Auto
            },
            allow_autoplay: !low_bandwidth_mode && !snapshot.is_compact_device,
            low_bandwidth_mode,
            native_controls: snapshot.is_compact_device,
            backend_hint: backend.hint(tier).to_string(),
        };

        debug!(
            tier = %decision.tier,
            preload = %decision.preload,
            low_bandwidth = decision.low_bandwidth_mode,
            hint = %decision.backend_hint,
            "Quality decided"
        );

        decision
    }

    /// Whether a telemetry change warrants re-deriving a running session's hints
    pub fn significant_change(&self, previous: &TelemetrySnapshot, next: &TelemetrySnapshot) -> bool {
        self.select_tier(previous) != self.select_tier(next)
            || previous.power_saving != next.power_saving
            || self.low_bandwidth_mode(previous) != self.low_bandwidth_mode(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tier: ConnectionTier, compact: bool) -> TelemetrySnapshot {
        TelemetrySnapshot {
            is_compact_device: compact,
            ..TelemetrySnapshot::with_connection(tier)
        }
    }

    #[test]
    fn test_slow_connection() {
        let policy = QualityPolicy::new();
        let decision = policy.decide(
            &snapshot(ConnectionTier::Slow, false),
            BackendKind::YouTube,
            QualityPreference::Auto,
        );
        assert_eq!(decision.tier, QualityTier::P240);
        assert!(decision.low_bandwidth_mode);
        assert_eq!(decision.preload, Preload::Metadata);
        assert!(!decision.allow_autoplay);
        assert_eq!(decision.backend_hint, "small");
    }

    #[test]
    fn test_fast_desktop() {
        let policy = QualityPolicy::new();
        let decision = policy.decide(
            &snapshot(ConnectionTier::Fast, false),
            BackendKind::Vimeo,
            QualityPreference::Auto,
        );
        assert_eq!(decision.tier, QualityTier::P1080);
        assert!(!decision.low_bandwidth_mode);
        assert!(decision.allow_autoplay);
        assert_eq!(decision.preload, Preload::Auto);
        assert_eq!(decision.backend_hint, "1080");
    }

    #[test]
    fn test_compact_tiers() {
        let policy = QualityPolicy::new();
        assert_eq!(policy.select_tier(&snapshot(ConnectionTier::Medium, true)), QualityTier::P360);
        assert_eq!(policy.select_tier(&snapshot(ConnectionTier::Medium, false)), QualityTier::P480);
        assert_eq!(policy.select_tier(&snapshot(ConnectionTier::Fast, true)), QualityTier::P720);

        let decision = policy.decide(
            &snapshot(ConnectionTier::Fast, true),
            BackendKind::YouTube,
            QualityPreference::Auto,
        );
        assert!(!decision.allow_autoplay);
        assert!(!decision.low_bandwidth_mode);
        assert!(decision.native_controls);
    }

    #[test]
    fn test_power_saving_takes_precedence() {
        let policy = QualityPolicy::new();
        for tier in [ConnectionTier::Fast, ConnectionTier::Medium, ConnectionTier::Slow] {
            let snap = TelemetrySnapshot {
                battery_percent: Some(12),
                power_saving: true,
                ..snapshot(tier, false)
            };
            let decision = policy.decide(&snap, BackendKind::YouTube, QualityPreference::Auto);
            assert!(decision.low_bandwidth_mode);
            assert_eq!(decision.tier, QualityTier::P240);
        }
    }

    #[test]
    fn test_compact_low_battery_and_data_saver() {
        let policy = QualityPolicy::new();
        let compact_low = TelemetrySnapshot {
            battery_percent: Some(25),
            ..snapshot(ConnectionTier::Fast, true)
        };
        assert!(policy.low_bandwidth_mode(&compact_low));

        let desktop_low = TelemetrySnapshot {
            battery_percent: Some(25),
            ..snapshot(ConnectionTier::Fast, false)
        };
        assert!(!policy.low_bandwidth_mode(&desktop_low));

        let saver = TelemetrySnapshot {
            data_saver_requested: true,
            ..snapshot(ConnectionTier::Fast, false)
        };
        assert!(policy.low_bandwidth_mode(&saver));
    }

    #[test]
    fn test_decision_is_pure() {
        let policy = QualityPolicy::new();
        let snap = snapshot(ConnectionTier::Medium, true);
        let a = policy.decide(&snap, BackendKind::File, QualityPreference::Auto);
        let b = policy.decide(&snap, BackendKind::File, QualityPreference::Auto);
        assert_eq!(a, b);
        assert_eq!(a.backend_hint, "auto");
    }

    #[test]
    fn test_fixed_preference() {
        let policy = QualityPolicy::new();
        let decision = policy.decide(
            &snapshot(ConnectionTier::Slow, false),
            BackendKind::YouTube,
            QualityPreference::Fixed(QualityTier::P720),
        );
        assert_eq!(decision.tier, QualityTier::P720);
        assert_eq!(decision.backend_hint, "hd720");
        assert!(decision.low_bandwidth_mode);
    }

    #[test]
    fn test_significant_change() {
        let policy = QualityPolicy::new();
        let fast = snapshot(ConnectionTier::Fast, false);
        let slow = snapshot(ConnectionTier::Slow, false);
        assert!(policy.significant_change(&fast, &slow));

        let fast_with_rtt = TelemetrySnapshot {
            round_trip_ms: Some(80),
            ..fast.clone()
        };
        assert!(!policy.significant_change(&fast, &fast_with_rtt));

        let saving = TelemetrySnapshot {
            battery_percent: Some(10),
            power_saving: true,
            ..slow.clone()
        };
        assert!(policy.significant_change(&slow, &saving));
    }
}
