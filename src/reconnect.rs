//! Serial acquisition state machine.
//!
//! Keeps the serial link alive independent of TCP client presence:
//! scan -> match-or-prompt -> open, with exponential backoff between failed
//! attempts and a short operator override window before each automatic
//! open. An empty scan parks the engine in a backoff-and-rescan wait; a
//! device lost mid-session re-enters the machine from the top.
//!
//! Selection precedence on each pass, first hit wins:
//! 1. exact hardware-identity match against the persisted last identity,
//! 2. normalized-label match (tolerates port renumbering),
//! 3. first configured keyword hit,
//! 4. interactive selection from the full list; with no console
//!    attached, fail fast instead of blocking on a prompt nobody can answer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::thread;

use serde_json::json;
use tracing::{debug, warn};

use crate::backoff::Backoff;
use crate::config::BridgeConfig;
use crate::console::{self, OverrideAction, PromptOutcome};
use crate::device_state::DeviceState;
use crate::error::BridgeError;
use crate::health::HealthLog;
use crate::locator::{DeviceLocator, SerialDeviceInfo};
use crate::port::{BridgePort, SerialLink};

/// Result of one acquisition cycle.
pub enum Acquired {
    /// The serial link is open and ready to be bridged.
    Link(Box<dyn SerialLink>),
    /// The operator asked to quit; the caller shuts down gracefully.
    Quit,
}

/// What one matching pass decided.
enum Pick {
    Device(SerialDeviceInfo),
    Rescan,
    Quit,
}

pub struct ReconnectEngine<'a> {
    cfg: &'a BridgeConfig,
    health: &'a HealthLog,
    locator: DeviceLocator,
    state: DeviceState,
    state_path: PathBuf,
    backoff: Backoff,
    interactive: bool,
    last_scan_was_empty: bool,
}

impl<'a> ReconnectEngine<'a> {
    pub fn new(
        cfg: &'a BridgeConfig,
        state: DeviceState,
        state_path: PathBuf,
        health: &'a HealthLog,
        interactive: bool,
    ) -> Self {
        Self {
            cfg,
            health,
            locator: DeviceLocator::new(),
            state,
            state_path,
            backoff: Backoff::new(&cfg.reconnect),
            interactive,
            last_scan_was_empty: false,
        }
    }

    /// Run the state machine until a serial link is open or the operator
    /// quits. Recoverable faults (empty scans, busy or failed opens) loop
    /// internally; only `NoDeviceSelected` escapes as an error.
    pub fn acquire(&mut self) -> Result<Acquired, BridgeError> {
        let mut announced_last = false;
        loop {
            if !announced_last {
                if let Some(last) = self.state.last_label.as_deref() {
                    println!("Previous target: {last}");
                    println!("Searching for the same device...");
                }
                announced_last = true;
            }

            let devices = self.locator.list();
            self.health
                .info("serial_scan", json!({ "count": devices.len() }));

            if devices.is_empty() {
                println!("No serial ports found. Plug the USB-serial device and wait...");
                self.health.warn("serial_no_ports", json!({}));
                self.last_scan_was_empty = true;
                self.sleep_backoff();
                continue;
            }
            if self.last_scan_was_empty {
                // Devices (re)appeared: a materially different snapshot
                // restarts the backoff schedule.
                self.backoff.reset();
                self.last_scan_was_empty = false;
            }

            let busy = self.probe_busy(&devices);
            let mut selected = match self.pick_initial(&devices, &busy)? {
                Pick::Device(device) => Some(device),
                Pick::Rescan => continue,
                Pick::Quit => return Ok(Acquired::Quit),
            };

            while let Some(device) = selected.take() {
                self.health.info(
                    "serial_selected",
                    json!({
                        "port": device.port_name,
                        "label": device.label,
                        "identity": device.identity,
                    }),
                );

                // Persist the candidate as intent before the open attempt: a
                // crash mid-open must not lose the operator's last choice.
                self.state.remember(&device);
                if let Err(e) = self.state.save(&self.state_path) {
                    warn!(path = %self.state_path.display(), "device state not saved: {e}");
                }

                match BridgePort::open(&device.port_name, &self.cfg.serial.link_settings()) {
                    Ok(port) => {
                        println!("Serial connected: {}", device.label);
                        self.health
                            .info("serial_connected", json!({ "port": device.port_name }));
                        self.backoff.reset();
                        return Ok(Acquired::Link(Box::new(port)));
                    }
                    Err(e) if e.is_busy() && self.interactive => {
                        self.health.warn(
                            "serial_open_failed_in_use",
                            json!({ "port": device.port_name, "error": e.to_string() }),
                        );
                        println!(
                            "{} appears to be in use. Please choose another port.",
                            device.port_name
                        );
                        match self.prompt(&devices, &busy) {
                            Pick::Device(other) => selected = Some(other),
                            Pick::Rescan => break,
                            Pick::Quit => return Ok(Acquired::Quit),
                        }
                    }
                    Err(e) => {
                        self.health.warn(
                            "serial_open_failed",
                            json!({ "port": device.port_name, "error": e.to_string() }),
                        );
                        println!("Failed to open {}. Retrying...", device.port_name);
                        self.sleep_backoff();
                        break;
                    }
                }
            }
            // Selection abandoned; rescan and match again.
        }
    }

    fn pick_initial(
        &mut self,
        devices: &[SerialDeviceInfo],
        busy: &HashMap<String, bool>,
    ) -> Result<Pick, BridgeError> {
        let automatic = pick_automatic(
            &self.locator,
            devices,
            &self.state,
            &self.cfg.device_select.preferred_keywords,
        )
        .cloned();

        let Some(device) = automatic else {
            if !self.interactive {
                return Err(BridgeError::NoDeviceSelected);
            }
            println!("No suitable device was auto-selected. Please choose a port.");
            return Ok(self.prompt(devices, busy));
        };

        let likely_busy = busy.get(&device.port_name).copied().unwrap_or(false);
        let status = if likely_busy { "in-use?" } else { "ready" };
        println!("Found: {} [{status}]", device.label);
        self.health.info(
            "auto_candidate",
            json!({
                "port": device.port_name,
                "label": device.label,
                "identity": device.identity,
                "likely_busy": likely_busy,
            }),
        );

        let window = self.cfg.device_select.override_window();
        if !self.interactive || window.is_zero() {
            return Ok(Pick::Device(device));
        }

        println!(
            "Auto-connecting. Press 'c' within {} seconds to change the target...",
            window.as_secs().max(1)
        );
        match console::override_window(window) {
            OverrideAction::Proceed => Ok(Pick::Device(device)),
            OverrideAction::Change => {
                println!("Switch requested. Showing the port list...");
                self.health.info("user_requested_change", json!({}));
                Ok(self.prompt(devices, busy))
            }
            OverrideAction::Quit => Ok(Pick::Quit),
        }
    }

    fn prompt(&self, devices: &[SerialDeviceInfo], busy: &HashMap<String, bool>) -> Pick {
        match console::prompt_select(devices, busy) {
            PromptOutcome::Selected(index) => Pick::Device(devices[index].clone()),
            PromptOutcome::Rescan => Pick::Rescan,
            PromptOutcome::Quit => Pick::Quit,
        }
    }

    /// Probe each scanned port with a short open attempt so prompts can tag
    /// ports that look exclusively held elsewhere. Advisory only.
    fn probe_busy(&self, devices: &[SerialDeviceInfo]) -> HashMap<String, bool> {
        let settings = self.cfg.serial.link_settings();
        devices
            .iter()
            .map(|d| {
                let busy = match BridgePort::open(&d.port_name, &settings) {
                    Ok(port) => {
                        drop(port);
                        false
                    }
                    Err(e) => {
                        debug!(port = %d.port_name, "busy probe: {e}");
                        true
                    }
                };
                (d.port_name.clone(), busy)
            })
            .collect()
    }

    fn sleep_backoff(&mut self) {
        let delay = self.backoff.next_delay();
        self.health
            .info("reconnect_wait", json!({ "delay_ms": delay.as_millis() as u64 }));
        thread::sleep(delay);
    }
}

/// Automatic selection rules 1-3, in precedence order. Pure so the
/// precedence is testable without a console or hardware.
pub fn pick_automatic<'d>(
    locator: &DeviceLocator,
    devices: &'d [SerialDeviceInfo],
    state: &DeviceState,
    keywords: &[String],
) -> Option<&'d SerialDeviceInfo> {
    locator
        .find_by_identity(devices, state.last_identity.as_deref())
        .or_else(|| locator.find_by_label(devices, state.last_label.as_deref()))
        .or_else(|| locator.find_by_keywords(devices, keywords))
}
