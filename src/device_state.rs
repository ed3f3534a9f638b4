//! Persisted record of the last selected device.
//!
//! Read once at startup and overwritten on every selection, before the open
//! attempt: the record reflects intent, not a confirmed connection, so a
//! crash mid-open keeps the operator's most recent explicit choice.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::locator::SerialDeviceInfo;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceState {
    pub last_identity: Option<String>,
    pub last_label: Option<String>,
    pub last_port_name: Option<String>,
}

impl DeviceState {
    /// Load the record; a missing or malformed file yields the empty record
    /// rather than failing startup.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                debug!(path = %path.display(), "device state unreadable, starting empty: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
    }

    /// Record `device` as the current selection intent.
    pub fn remember(&mut self, device: &SerialDeviceInfo) {
        self.last_identity = device.identity.clone();
        self.last_label = Some(device.label.clone());
        self.last_port_name = Some(device.port_name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = DeviceState::load(&dir.path().join("absent.json"));
        assert_eq!(state, DeviceState::default());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(DeviceState::load(&path), DeviceState::default());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = DeviceState::default();
        state.remember(&SerialDeviceInfo {
            port_name: "COM7".to_string(),
            label: "Widget Adapter (COM7)".to_string(),
            identity: Some("usb:10c4:ea60:0001".to_string()),
        });
        state.save(&path).unwrap();

        let reloaded = DeviceState::load(&path);
        assert_eq!(reloaded, state);
        assert_eq!(reloaded.last_port_name.as_deref(), Some("COM7"));
    }

    #[test]
    fn partial_record_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"last_label": "Widget (COM1)"}"#).unwrap();

        let state = DeviceState::load(&path);
        assert_eq!(state.last_label.as_deref(), Some("Widget (COM1)"));
        assert!(state.last_identity.is_none());
        assert!(state.last_port_name.is_none());
    }
}
