//! Real serial port implementation.
//!
//! Wraps the `serialport` crate's handle with our `SerialLink` trait. Reads
//! use a short fixed timeout so a pump loop can observe cancellation between
//! reads even though each read call blocks.

use std::io::{Read, Write};
use std::time::Duration;

use tracing::warn;

use super::error::PortError;
use super::traits::{LinkSettings, SerialLink};

/// Upper bound on cancellation latency for the serial read loop. A read that
/// times out reports zero bytes and the loop re-checks its cancel flag, so
/// raising this delays session teardown by the same amount.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// An open serial link backed by a real OS handle.
pub struct BridgePort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl BridgePort {
    /// Open `port_name` with the given framing and the fixed poll timeout.
    ///
    /// Line-state flags (DTR/RTS) are applied after the open succeeds.
    /// Framing modes the backend cannot express are degraded with a warning
    /// instead of failing the reconnect loop forever.
    pub fn open(port_name: &str, settings: &LinkSettings) -> Result<Self, PortError> {
        let (parity, parity_warn) = settings.parity.to_backend();
        let (flow_control, flow_warn) = settings.flow_control.to_backend();
        for message in [parity_warn, flow_warn].into_iter().flatten() {
            warn!(port = %port_name, "{message}");
        }

        let mut port = serialport::new(port_name, settings.baud_rate)
            .data_bits(settings.data_bits.into())
            .parity(parity)
            .stop_bits(settings.stop_bits.into())
            .flow_control(flow_control)
            .timeout(POLL_TIMEOUT)
            .open()
            .map_err(|e| PortError::classify_open(port_name, e))?;

        port.write_data_terminal_ready(settings.dtr_enable)?;
        port.write_request_to_send(settings.rts_enable)?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialLink for BridgePort {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            // Timeout with nothing to read is not a fault.
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        self.port.write_all(data).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_link(&self) -> Result<Box<dyn SerialLink>, PortError> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
        }))
    }
}

impl std::fmt::Debug for BridgePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgePort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}
