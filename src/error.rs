//! Top-level error type for the bridge process.
//!
//! Only the variants in this enum abort the process; every serial- or
//! session-level fault is classified at the port layer (`PortError`) and
//! drives a state transition instead of an exit.

use thiserror::Error;

use crate::config::ConfigError;
use crate::lease::MAX_SLOTS;

/// Fatal bridge errors. Anything recoverable lives in `PortError` or is
/// handled in place by the supervisor loop.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Every instance slot is held by a live process.
    #[error("all {MAX_SLOTS} instance slots are taken by running bridge processes")]
    NoFreeSlot,

    /// An explicitly configured TCP port could not be bound. No fallback is
    /// attempted; the configured port is a contract with the operator.
    #[error("configured TCP port {port} is already in use on {host}")]
    PortUnavailable { host: String, port: u16 },

    /// Auto-negotiation ran out of candidate ports.
    #[error("no free TCP port found at or above {base}")]
    NoPortAvailable { base: u16 },

    /// Device selection fell through to the interactive prompt, but no
    /// console is attached to answer it.
    #[error("no serial device matched and no console is attached to pick one")]
    NoDeviceSelected,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
