//! Serial device discovery and matching.
//!
//! Enumeration quality varies by platform and port type: USB ports yield a
//! rich label and a replug-stable identity, everything else degrades to the
//! bare port name. All matching below treats identity as optional for that
//! reason.

use once_cell::sync::Lazy;
use regex::Regex;
use serialport::SerialPortType;
use tracing::warn;

/// One scanned device. Rebuilt on every scan; only `identity` is expected to
/// survive unplug/replug and reboot, and only when the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDeviceInfo {
    /// OS port identifier, e.g. `COM7` or `/dev/ttyUSB0`. Not stable across
    /// replug.
    pub port_name: String,
    /// Human-readable label shown in prompts, e.g. `"CP2102N (COM7)"`.
    pub label: String,
    /// Stable hardware identity when obtainable, e.g. `usb:10c4:ea60:0001`.
    pub identity: Option<String>,
}

/// Strips one trailing parenthesized port annotation, e.g.
/// `"Widget Adapter (COM3)"` -> `"Widget Adapter"`.
static TRAILING_PORT_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("static regex"));

pub struct DeviceLocator;

impl DeviceLocator {
    pub fn new() -> Self {
        Self
    }

    /// Enumerate available serial devices, ordered case-insensitively by
    /// port name and de-duplicated so repeated scans are diffable.
    /// Enumeration failures degrade to an empty scan rather than an error.
    pub fn list(&self) -> Vec<SerialDeviceInfo> {
        let ports = match serialport::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("serial enumeration failed: {e}");
                return Vec::new();
            }
        };

        let mut devices: Vec<SerialDeviceInfo> = ports
            .into_iter()
            .map(|p| match p.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb
                        .product
                        .as_deref()
                        .or(usb.manufacturer.as_deref())
                        .unwrap_or("USB serial device");
                    let identity = match usb.serial_number.as_deref() {
                        Some(serial) => format!("usb:{:04x}:{:04x}:{serial}", usb.vid, usb.pid),
                        None => format!("usb:{:04x}:{:04x}", usb.vid, usb.pid),
                    };
                    SerialDeviceInfo {
                        label: format!("{product} ({})", p.port_name),
                        identity: Some(identity),
                        port_name: p.port_name,
                    }
                }
                _ => SerialDeviceInfo {
                    label: p.port_name.clone(),
                    identity: None,
                    port_name: p.port_name,
                },
            })
            .collect();

        devices.sort_by_key(|d| d.port_name.to_lowercase());
        devices.dedup_by_key(|d| d.port_name.to_lowercase());
        devices
    }

    /// Exact, case-insensitive identity match. Empty or absent identities
    /// never match.
    pub fn find_by_identity<'a>(
        &self,
        devices: &'a [SerialDeviceInfo],
        identity: Option<&str>,
    ) -> Option<&'a SerialDeviceInfo> {
        let wanted = identity?.trim();
        if wanted.is_empty() {
            return None;
        }
        devices.iter().find(|d| {
            d.identity
                .as_deref()
                .is_some_and(|id| id.eq_ignore_ascii_case(wanted))
        })
    }

    /// Match by label after stripping the trailing port annotation, so the
    /// same physical device re-enumerating under a different port identifier
    /// is still recognized.
    pub fn find_by_label<'a>(
        &self,
        devices: &'a [SerialDeviceInfo],
        last_label: Option<&str>,
    ) -> Option<&'a SerialDeviceInfo> {
        let last = last_label?.trim();
        if last.is_empty() {
            return None;
        }
        let wanted = normalize_label(last).to_lowercase();
        devices
            .iter()
            .find(|d| normalize_label(&d.label).to_lowercase() == wanted)
    }

    /// First keyword with any match wins; within that keyword, the first
    /// matching device in list order wins.
    pub fn find_by_keywords<'a>(
        &self,
        devices: &'a [SerialDeviceInfo],
        keywords: &[String],
    ) -> Option<&'a SerialDeviceInfo> {
        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            if let Some(hit) = devices
                .iter()
                .find(|d| d.label.to_lowercase().contains(&keyword))
            {
                return Some(hit);
            }
        }
        None
    }
}

impl Default for DeviceLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip one trailing parenthesized port annotation and surrounding
/// whitespace from a device label.
pub fn normalize_label(label: &str) -> String {
    TRAILING_PORT_ANNOTATION.replace(label, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(port: &str, label: &str, identity: Option<&str>) -> SerialDeviceInfo {
        SerialDeviceInfo {
            port_name: port.to_string(),
            label: label.to_string(),
            identity: identity.map(str::to_string),
        }
    }

    #[test]
    fn normalize_strips_trailing_port_annotation() {
        assert_eq!(normalize_label("Widget Adapter (COM3)"), "Widget Adapter");
        assert_eq!(normalize_label("Widget Adapter (COM9) "), "Widget Adapter");
        assert_eq!(
            normalize_label("CP2102N (/dev/ttyUSB0)"),
            "CP2102N"
        );
        assert_eq!(normalize_label("Plain Name"), "Plain Name");
    }

    #[test]
    fn normalize_strips_only_the_trailing_annotation() {
        assert_eq!(
            normalize_label("Widget (rev 2) Adapter (COM3)"),
            "Widget (rev 2) Adapter"
        );
    }

    #[test]
    fn identity_match_is_case_insensitive_and_exact() {
        let locator = DeviceLocator::new();
        let devices = vec![
            device("COM3", "A (COM3)", Some("usb:10c4:ea60:0001")),
            device("COM4", "B (COM4)", Some("usb:0403:6001:XY99")),
        ];
        let hit = locator
            .find_by_identity(&devices, Some("USB:0403:6001:xy99"))
            .expect("identity should match");
        assert_eq!(hit.port_name, "COM4");
        assert!(locator.find_by_identity(&devices, Some("")).is_none());
        assert!(locator.find_by_identity(&devices, None).is_none());
        assert!(locator
            .find_by_identity(&devices, Some("usb:0403:6001"))
            .is_none());
    }

    #[test]
    fn label_match_survives_port_renumbering() {
        let locator = DeviceLocator::new();
        let devices = vec![device("COM9", "Widget Adapter (COM9)", None)];
        let hit = locator
            .find_by_label(&devices, Some("Widget Adapter (COM3)"))
            .expect("normalized label should match");
        assert_eq!(hit.port_name, "COM9");
    }

    #[test]
    fn keyword_priority_is_caller_order_then_list_order() {
        let locator = DeviceLocator::new();
        let devices = vec![
            device("COM1", "Generic Modem (COM1)", None),
            device("COM2", "CH340 Converter (COM2)", None),
            device("COM3", "FTDI FT232R (COM3)", None),
            device("COM4", "Second CH340 (COM4)", None),
        ];
        let keywords = vec!["FTDI".to_string(), "CH340".to_string()];
        let hit = locator.find_by_keywords(&devices, &keywords).unwrap();
        assert_eq!(hit.port_name, "COM3");

        let keywords = vec!["CH340".to_string(), "FTDI".to_string()];
        let hit = locator.find_by_keywords(&devices, &keywords).unwrap();
        assert_eq!(hit.port_name, "COM2");

        let keywords = vec!["nothing".to_string()];
        assert!(locator.find_by_keywords(&devices, &keywords).is_none());
    }
}
