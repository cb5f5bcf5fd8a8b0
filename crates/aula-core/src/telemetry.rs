//! Device, network and power telemetry
//!
//! [`TelemetrySource`] keeps the best-known [`TelemetrySnapshot`] of the host
//! environment. It is refreshed by host events (viewport resize, connection
//! change, battery change) and never polls, except for the one-shot battery read
//! the host exposes asynchronously. Every signal is optional: a missing signal
//! degrades to a safe default instead of failing.

use crate::types::{ConnectionTier, PlaybackConfig};
use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// Effective network type reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    G2,
    #[serde(rename = "3g")]
    G3,
    #[serde(rename = "4g")]
    G4,
    #[serde(other)]
    Unknown,
}

impl EffectiveConnectionType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "slow-2g" => EffectiveConnectionType::Slow2g,
            "2g" => EffectiveConnectionType::G2,
            "3g" => EffectiveConnectionType::G3,
            "4g" => EffectiveConnectionType::G4,
            _ => EffectiveConnectionType::Unknown,
        }
    }
}

/// Network information API reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInformation {
    pub effective_type: EffectiveConnectionType,
    /// Downlink estimate in Mbps
    pub downlink_mbps: Option<f64>,
    /// Round-trip estimate in milliseconds
    pub rtt_ms: Option<u32>,
    pub save_data: bool,
}

/// Battery API reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level between 0.0 and 1.0
    pub level: f64,
    pub charging: bool,
}

impl BatteryStatus {
    pub fn percent(&self) -> u8 {
        (self.level.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Host events the source listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSignalKind {
    Resize,
    ConnectionChange,
    BatteryChange,
}

/// Payload delivered with a host event
#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    Resize { width: u32 },
    ConnectionChange(Option<NetworkInformation>),
    BatteryChange(BatteryStatus),
}

/// Handle to a registered host listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback invoked by the host for each event
pub type HostListener = Arc<dyn Fn(HostSignal) + Send + Sync>;

/// Host environment exposing device, network and power signals
#[async_trait]
pub trait TelemetryHost: Send + Sync {
    /// User agent string, if exposed
    fn user_agent(&self) -> Option<String>;

    /// Current viewport width in CSS pixels
    fn viewport_width(&self) -> Option<u32>;

    /// Network information API, if the host has one
    fn network_information(&self) -> Option<NetworkInformation>;

    /// One-shot battery read; `None` when the API is missing or refused
    async fn battery_status(&self) -> Option<BatteryStatus>;

    /// Register a listener; `None` when the host cannot emit this signal
    fn add_listener(&self, kind: HostSignalKind, listener: HostListener) -> Option<ListenerId>;

    fn remove_listener(&self, id: ListenerId);
}

/// Read-only view of the host environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub is_compact_device: bool,
    pub connection_tier: ConnectionTier,
    pub downlink_mbps: Option<f64>,
    pub round_trip_ms: Option<u32>,
    pub data_saver_requested: bool,
    /// Absent when the battery API is unavailable
    pub battery_percent: Option<u8>,
    pub power_saving: bool,
}

impl Default for TelemetrySnapshot {
    /// Optimistic defaults used when no signal is available
    fn default() -> Self {
        Self {
            is_compact_device: false,
            connection_tier: ConnectionTier::Fast,
            downlink_mbps: None,
            round_trip_ms: None,
            data_saver_requested: false,
            battery_percent: None,
            power_saving: false,
        }
    }
}

impl TelemetrySnapshot {
    /// Snapshot with the given connection tier and optimistic defaults elsewhere
    pub fn with_connection(connection_tier: ConnectionTier) -> Self {
        Self {
            connection_tier,
            ..Default::default()
        }
    }
}

/// Thresholds used to classify raw signals
#[derive(Debug, Clone, Copy)]
pub struct TelemetryThresholds {
    pub compact_viewport_max: u32,
    pub low_battery_percent: u8,
    /// Downlink above which a top-tier connection counts as fast (Mbps)
    pub fast_downlink_mbps: f64,
}

impl Default for TelemetryThresholds {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for TelemetryThresholds {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            compact_viewport_max: config.compact_viewport_max,
            low_battery_percent: config.low_battery_percent,
            fast_downlink_mbps: 10.0,
        }
    }
}

const COMPACT_AGENT_MARKERS: &[&str] = &[
    "android",
    "blackberry",
    "iemobile",
    "ipad",
    "iphone",
    "ipod",
    "opera mini",
    "webos",
];

/// Whether a user agent identifies a phone or tablet
pub fn is_compact_agent(user_agent: &str) -> bool {
    let agent = user_agent.to_lowercase();
    COMPACT_AGENT_MARKERS.iter().any(|marker| agent.contains(marker))
}

/// Classify a network reading; no reading means an optimistic `Fast`
pub fn classify_connection(
    info: Option<&NetworkInformation>,
    thresholds: &TelemetryThresholds,
) -> ConnectionTier {
    let Some(info) = info else {
        return ConnectionTier::Fast;
    };
    match info.effective_type {
        EffectiveConnectionType::G4
            if info.downlink_mbps.unwrap_or(0.0) > thresholds.fast_downlink_mbps =>
        {
            ConnectionTier::Fast
        }
        EffectiveConnectionType::G4 | EffectiveConnectionType::G3 => ConnectionTier::Medium,
        _ => ConnectionTier::Slow,
    }
}

fn apply_network(
    snapshot: &mut TelemetrySnapshot,
    info: Option<&NetworkInformation>,
    thresholds: &TelemetryThresholds,
) {
    snapshot.connection_tier = classify_connection(info, thresholds);
    snapshot.downlink_mbps = info.and_then(|i| i.downlink_mbps);
    snapshot.round_trip_ms = info.and_then(|i| i.rtt_ms);
    snapshot.data_saver_requested = info.map(|i| i.save_data).unwrap_or(false);
}

fn apply_battery(
    snapshot: &mut TelemetrySnapshot,
    battery: Option<BatteryStatus>,
    thresholds: &TelemetryThresholds,
) {
    snapshot.battery_percent = battery.map(|b| b.percent());
    snapshot.power_saving = snapshot
        .battery_percent
        .map(|p| p < thresholds.low_battery_percent)
        .unwrap_or(false);
}

/// Continuously updated telemetry snapshot backed by host events
pub struct TelemetrySource {
    host: Arc<dyn TelemetryHost>,
    thresholds: TelemetryThresholds,
    agent_is_compact: bool,
    tx: Arc<watch::Sender<TelemetrySnapshot>>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl TelemetrySource {
    /// Read the initial snapshot from the host and start listening
    pub async fn attach(host: Arc<dyn TelemetryHost>, thresholds: TelemetryThresholds) -> Self {
        let agent_is_compact = host
            .user_agent()
            .map(|ua| is_compact_agent(&ua))
            .unwrap_or(false);

        let mut snapshot = TelemetrySnapshot::default();
        snapshot.is_compact_device = agent_is_compact
            || host
                .viewport_width()
                .map(|w| w <= thresholds.compact_viewport_max)
                .unwrap_or(false);

        let network = host.network_information();
        if network.is_none() {
            let absent = Error::TelemetryUnavailable { signal: "network" };
            debug!(error = %absent, "Assuming fast connection");
        }
        apply_network(&mut snapshot, network.as_ref(), &thresholds);

        let battery = host.battery_status().await;
        if battery.is_none() {
            let absent = Error::TelemetryUnavailable { signal: "battery" };
            debug!(error = %absent, "Assuming no power saving");
        }
        apply_battery(&mut snapshot, battery, &thresholds);

        info!(
            compact = snapshot.is_compact_device,
            connection = %snapshot.connection_tier,
            battery = ?snapshot.battery_percent,
            "Telemetry attached"
        );

        let (tx, _) = watch::channel(snapshot);
        let source = Self {
            host,
            thresholds,
            agent_is_compact,
            tx: Arc::new(tx),
            listeners: Mutex::new(Vec::new()),
        };
        source.start();
        source
    }

    /// Register host listeners; no-op while already listening
    pub fn start(&self) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        if !listeners.is_empty() {
            return;
        }

        for kind in [
            HostSignalKind::Resize,
            HostSignalKind::ConnectionChange,
            HostSignalKind::BatteryChange,
        ] {
            let listener = self.listener();
            match self.host.add_listener(kind, listener) {
                Some(id) => listeners.push(id),
                None => debug!(?kind, "Host cannot emit signal"),
            }
        }
    }

    /// Remove every registered host listener; safe to call repeatedly
    pub fn stop(&self) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        for id in listeners.drain(..) {
            self.host.remove_listener(id);
        }
    }

    /// Number of host listeners currently registered
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Latest known snapshot
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.tx.subscribe()
    }

    fn listener(&self) -> HostListener {
        let tx = Arc::clone(&self.tx);
        let thresholds = self.thresholds;
        let agent_is_compact = self.agent_is_compact;

        Arc::new(move |signal: HostSignal| {
            tx.send_if_modified(|snapshot| {
                let before = snapshot.clone();
                match &signal {
                    HostSignal::Resize { width } => {
                        snapshot.is_compact_device =
                            agent_is_compact || *width <= thresholds.compact_viewport_max;
                    }
                    HostSignal::ConnectionChange(info) => {
                        apply_network(snapshot, info.as_ref(), &thresholds);
                    }
                    HostSignal::BatteryChange(battery) => {
                        apply_battery(snapshot, Some(*battery), &thresholds);
                    }
                }
                let changed = *snapshot != before;
                if changed {
                    debug!(?signal, "Telemetry updated");
                }
                changed
            });
        })
    }
}

impl Drop for TelemetrySource {
    fn drop(&mut self) {
        self.stop();
    }
}
