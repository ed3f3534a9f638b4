//! Serial port abstraction layer.
//!
//! The `SerialLink` trait decouples the session and reconnect engine from
//! real hardware; `BridgePort` is the `serialport`-backed implementation and
//! `MockSerialLink` the scripted one used by tests.

mod error;
mod mock;
mod serial;
mod traits;

pub use error::PortError;
pub use mock::MockSerialLink;
pub use serial::{BridgePort, POLL_TIMEOUT};
pub use traits::{DataBits, FlowControl, LinkSettings, Parity, SerialLink, StopBits};
