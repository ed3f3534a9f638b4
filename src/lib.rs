//! serial-bridge library
//!
//! A persistent bridge exposing one serial (UART) device as a TCP endpoint.
//! The payload is an opaque byte stream; the value is in the lifecycle
//! handling: device unplug/replug, TCP client churn, and multiple bridge
//! instances coexisting on one host.
//!
//! # Modules
//!
//! - `config`: per-instance TOML configuration
//! - `port`: serial link abstraction (real + mock)
//! - `lease`: cross-process instance slot leasing
//! - `locator`: device discovery and identity/label/keyword matching
//! - `device_state`: persisted last-device record
//! - `health`: append-only structured health log
//! - `backoff`: reconnect delay schedule
//! - `reconnect`: serial acquisition state machine
//! - `console`: interactive selection prompt and override window
//! - `tcp`: listener with port auto-negotiation
//! - `session`: bidirectional byte pump between serial and one TCP client
//! - `supervisor`: top-level control loop

pub mod backoff;
pub mod config;
pub mod console;
pub mod device_state;
pub mod error;
pub mod health;
pub mod lease;
pub mod locator;
pub mod port;
pub mod reconnect;
pub mod session;
pub mod supervisor;
pub mod tcp;

// Re-export commonly used types for convenience
pub use backoff::Backoff;
pub use config::{BridgeConfig, ConfigError, ConfigResult};
pub use device_state::DeviceState;
pub use error::BridgeError;
pub use health::HealthLog;
pub use lease::InstanceLease;
pub use locator::{DeviceLocator, SerialDeviceInfo};
pub use port::{
    BridgePort, DataBits, FlowControl, LinkSettings, MockSerialLink, Parity, PortError,
    SerialLink, StopBits, POLL_TIMEOUT,
};
pub use reconnect::{Acquired, ReconnectEngine};
pub use session::{CancelToken, SessionOutcome, SHUTDOWN_GRACE};
pub use supervisor::BridgeSupervisor;
pub use tcp::{TcpFront, AUTO_PORT_BASE};
