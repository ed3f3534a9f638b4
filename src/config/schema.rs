//! Configuration schema definitions.
//!
//! One `BridgeConfig` per instance, all sections defaulting individually so
//! a sparse config file stays valid. Values are immutable for the process
//! lifetime once `sanitize` and `apply_instance_paths` have run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::port::LinkSettings;

/// Per-instance bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// TCP listener configuration
    pub tcp: TcpConfig,
    /// Serial framing configuration
    pub serial: SerialConfig,
    /// Device selection preferences
    pub device_select: DeviceSelectConfig,
    /// Reconnect backoff parameters
    pub reconnect: ReconnectConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Clamp operator-tunable values to sane minimums so a hostile config
    /// cannot produce a shrinking backoff or an unbounded override window.
    pub fn sanitize(&mut self) {
        self.reconnect.initial_delay_ms = self.reconnect.initial_delay_ms.max(1);
        self.reconnect.max_delay_ms = self
            .reconnect
            .max_delay_ms
            .max(self.reconnect.initial_delay_ms);
        if !self.reconnect.backoff_factor.is_finite() || self.reconnect.backoff_factor < 1.0 {
            self.reconnect.backoff_factor = 1.0;
        }
        self.device_select.override_window_ms = self.device_select.override_window_ms.min(60_000);
    }

    /// Substitute the instance id into state/log paths so instances started
    /// from identical configuration never collide on the same file.
    pub fn apply_instance_paths(&mut self, instance_id: u16) {
        self.device_select.state_file =
            resolve_instance_path(&self.device_select.state_file, instance_id);
        self.logging.health_log = resolve_instance_path(&self.logging.health_log, instance_id);
    }
}

/// TCP listener section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Host address to bind to
    pub bind_host: String,
    /// Explicit listening port; absent means auto-negotiate from the
    /// instance-derived base port.
    pub port: Option<u16>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: None,
        }
    }
}

/// Serial framing section. Mirrors `LinkSettings` field for field so the
/// config file speaks the same names as the port layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: crate::port::DataBits,
    pub parity: crate::port::Parity,
    pub stop_bits: crate::port::StopBits,
    pub flow_control: crate::port::FlowControl,
    pub dtr_enable: bool,
    pub rts_enable: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let defaults = LinkSettings::default();
        Self {
            baud_rate: defaults.baud_rate,
            data_bits: defaults.data_bits,
            parity: defaults.parity,
            stop_bits: defaults.stop_bits,
            flow_control: defaults.flow_control,
            dtr_enable: defaults.dtr_enable,
            rts_enable: defaults.rts_enable,
        }
    }
}

impl SerialConfig {
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
            dtr_enable: self.dtr_enable,
            rts_enable: self.rts_enable,
        }
    }
}

/// Device selection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelectConfig {
    /// Keywords tried in order against device labels when no persisted
    /// identity or label matches.
    pub preferred_keywords: Vec<String>,
    /// Path of the persisted last-device record.
    pub state_file: String,
    /// How long the operator gets to override an automatic selection.
    pub override_window_ms: u64,
}

impl Default for DeviceSelectConfig {
    fn default() -> Self {
        Self {
            preferred_keywords: vec![
                "CP210".to_string(),
                "FTDI".to_string(),
                "CH340".to_string(),
                "USB Serial".to_string(),
            ],
            state_file: "serial-bridge.state.json".to_string(),
            override_window_ms: 3000,
        }
    }
}

impl DeviceSelectConfig {
    pub fn override_window(&self) -> Duration {
        Duration::from_millis(self.override_window_ms)
    }
}

/// Reconnect backoff section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path of the append-only structured health log.
    pub health_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            health_log: "serial-bridge.health.jsonl".to_string(),
        }
    }
}

/// Substitute a `{instance}` placeholder, or append `_N` before the
/// extension when there is none. Paths already carrying the suffix are left
/// alone so repeated resolution is idempotent.
pub fn resolve_instance_path(path: &str, instance_id: u16) -> String {
    if path.contains("{instance}") {
        return path.replace("{instance}", &instance_id.to_string());
    }

    let p = Path::new(path);
    let stem = p
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.ends_with(&format!("_{instance_id}")) {
        return path.to_string();
    }

    let suffixed = match p.extension() {
        Some(ext) => format!("{stem}_{instance_id}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{instance_id}"),
    };
    match p.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(suffixed).to_string_lossy().into_owned()
        }
        _ => suffixed,
    }
}
