//! Top-level control loop.
//!
//! Composes lease, config, health log, listener, reconnect engine and
//! sessions into one supervisor: the serial link stays open across any
//! number of TCP client sessions, and a device lost mid-session re-enters
//! serial acquisition without touching the listener.

use std::path::PathBuf;

use serde_json::json;
use tracing::{info, warn};

use crate::config;
use crate::console;
use crate::device_state::DeviceState;
use crate::error::BridgeError;
use crate::health::HealthLog;
use crate::lease::InstanceLease;
use crate::reconnect::{Acquired, ReconnectEngine};
use crate::session::{self, CancelToken, SessionOutcome};
use crate::tcp::TcpFront;

pub struct BridgeSupervisor {
    base_dir: PathBuf,
}

impl BridgeSupervisor {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Run the bridge until the operator quits (Ok) or a fatal startup
    /// error occurs (Err). Serial- and session-level faults never escape
    /// this loop.
    pub fn run(&self) -> Result<(), BridgeError> {
        let scope_seed = self
            .base_dir
            .canonicalize()
            .unwrap_or_else(|_| self.base_dir.clone())
            .to_string_lossy()
            .into_owned();
        let lease = InstanceLease::acquire(&scope_seed)?;
        let instance_id = lease.instance_id();

        let (cfg, cfg_path) = config::load_or_create_for_instance(&self.base_dir, instance_id)?;

        let health = HealthLog::open(&self.base_dir.join(&cfg.logging.health_log));
        health.info(
            "startup",
            json!({
                "base_dir": self.base_dir.display().to_string(),
                "config": cfg_path.display().to_string(),
                "instance": instance_id,
                "config_section": format!("instances.{instance_id}"),
                "version": env!("CARGO_PKG_VERSION"),
            }),
        );

        println!("Instance: {instance_id}");
        println!("Config section: instances.{instance_id}");
        println!("State file: {}", cfg.device_select.state_file);
        println!("Health log: {}", cfg.logging.health_log);

        let state_path = self.base_dir.join(&cfg.device_select.state_file);
        let state = DeviceState::load(&state_path);

        let front = TcpFront::listen(&cfg.tcp, instance_id)?;
        let local = front.local_addr();
        let mode = if cfg.tcp.port.is_some() { "configured" } else { "auto" };
        health.info(
            "tcp_listening",
            json!({ "host": cfg.tcp.bind_host, "port": local.port(), "mode": mode }),
        );
        println!("TCP listening: {local} ({mode})");

        let interactive = console::is_interactive();
        if !interactive {
            info!("no console attached, running non-interactively");
        }
        let mut engine =
            ReconnectEngine::new(&cfg, state, state_path, &health, interactive);

        // Outer loop: keep the serial link open even when no client is
        // attached; reconnect whenever a session reports the device gone.
        loop {
            let link = match engine.acquire()? {
                Acquired::Link(link) => link,
                Acquired::Quit => {
                    health.warn("user_exit", json!({}));
                    return Ok(());
                }
            };

            // Client loop: the serial link survives any number of sessions.
            loop {
                println!("Waiting for TCP client on {local} ...");
                health.info("tcp_wait_client", json!({ "port": local.port() }));

                let (stream, peer) = match front.accept() {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        health.error("tcp_accept_failed", json!({ "error": e.to_string() }));
                        continue;
                    }
                };

                health.info("tcp_client_connected", json!({ "remote": peer.to_string() }));
                println!("Client connected: {peer}");

                let cancel = CancelToken::new();
                let outcome = session::run(link.as_ref(), stream, &cancel);

                health.info("tcp_client_disconnected", json!({ "remote": peer.to_string() }));
                println!("Client disconnected.");

                match outcome {
                    SessionOutcome::SerialLost(cause) => {
                        health.warn(
                            "serial_disconnected_in_session",
                            json!({ "error": cause.to_string() }),
                        );
                        println!("Serial disconnected. Reconnecting...");
                        break;
                    }
                    SessionOutcome::ClientClosed => {}
                    SessionOutcome::Cancelled => {
                        health.info("session_cancelled", json!({}));
                    }
                }
            }
            // Dropping the link closes the handle before re-acquisition.
        }
    }
}

/// Installation directory: where the executable lives, falling back to the
/// working directory when that cannot be determined.
pub fn default_base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
