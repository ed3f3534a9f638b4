//! TCP listener front-end.
//!
//! Exactly one listening socket exists for the process lifetime. An
//! explicitly configured port is a contract: binding it must succeed or the
//! process fails fatally. Without one, the listener probes sequentially
//! upward from an instance-derived base port so that distinct instances
//! self-segregate.

use std::net::{SocketAddr, TcpListener, TcpStream};

use crate::config::TcpConfig;
use crate::error::BridgeError;

/// Base of the auto-negotiated port range; instance `k` starts probing at
/// `AUTO_PORT_BASE + k`.
pub const AUTO_PORT_BASE: u16 = 7000;

pub struct TcpFront {
    listener: TcpListener,
    local: SocketAddr,
}

impl TcpFront {
    /// Bind the configured port, or auto-negotiate from the instance base.
    pub fn listen(cfg: &TcpConfig, instance_id: u16) -> Result<Self, BridgeError> {
        match cfg.port {
            Some(port) => Self::listen_exact(&cfg.bind_host, port),
            None => Self::listen_auto(&cfg.bind_host, AUTO_PORT_BASE + instance_id),
        }
    }

    /// Bind exactly `port` or fail with `PortUnavailable`.
    pub fn listen_exact(bind_host: &str, port: u16) -> Result<Self, BridgeError> {
        match TcpListener::bind((bind_host, port)) {
            Ok(listener) => Self::from_listener(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                Err(BridgeError::PortUnavailable {
                    host: bind_host.to_string(),
                    port,
                })
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    /// Probe upward from `base` until a port binds, or fail with
    /// `NoPortAvailable` once the address space is exhausted.
    pub fn listen_auto(bind_host: &str, base: u16) -> Result<Self, BridgeError> {
        for port in base..=u16::MAX {
            match TcpListener::bind((bind_host, port)) {
                Ok(listener) => return Self::from_listener(listener),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
                Err(e) => return Err(BridgeError::Io(e)),
            }
        }
        Err(BridgeError::NoPortAvailable { base })
    }

    fn from_listener(listener: TcpListener) -> Result<Self, BridgeError> {
        let local = listener.local_addr()?;
        Ok(Self { listener, local })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Block until a client connects. Errors here are transient by policy:
    /// the caller logs and calls `accept` again.
    pub fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept()
    }
}
