//! Port-specific error types.
//!
//! Serial faults are kept separate from application-level errors so the
//! reconnect engine and the session can classify them without dragging the
//! whole taxonomy around.

use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The port exists but is exclusively held by another process.
    #[error("serial port {0} is in use by another process")]
    Busy(String),

    /// The specified serial port was not found on the system.
    #[error("serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Classify an open failure, mapping exclusive-access conditions to
    /// `Busy` so the engine can re-prompt instead of backing off.
    pub fn classify_open(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::NotFound(port_name.to_string()),
            serialport::ErrorKind::Io(kind) if is_busy_kind(kind) => {
                Self::Busy(port_name.to_string())
            }
            _ if looks_busy(&err.description) => Self::Busy(port_name.to_string()),
            _ => Self::Serial(err),
        }
    }

    /// Whether this error means another process holds the port.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

fn is_busy_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::AlreadyExists
    )
}

fn looks_busy(description: &str) -> bool {
    let d = description.to_ascii_lowercase();
    d.contains("busy") || d.contains("denied") || d.contains("in use")
}
