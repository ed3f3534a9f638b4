//! Core trait and framing parameters for the serial link.
//!
//! `SerialLink` abstracts over the open serial handle so both real ports and
//! the mock implementation can be pumped by a session interchangeably.

use super::error::PortError;
use serde::{Deserialize, Serialize};

/// Framing parameters applied when opening the serial link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits per character.
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Assert DTR after opening.
    pub dtr_enable: bool,

    /// Assert RTS after opening.
    pub rts_enable: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            dtr_enable: false,
            rts_enable: false,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking modes.
///
/// `Mark` and `Space` are accepted for configuration compatibility but the
/// `serialport` backend cannot express them; conversion degrades to `None`
/// and reports the substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Convert to the backend type, returning a warning message when the
    /// requested mode had to be degraded.
    pub fn to_backend(self) -> (serialport::Parity, Option<&'static str>) {
        match self {
            Parity::None => (serialport::Parity::None, None),
            Parity::Odd => (serialport::Parity::Odd, None),
            Parity::Even => (serialport::Parity::Even, None),
            Parity::Mark => (
                serialport::Parity::None,
                Some("parity 'mark' is not supported by this backend, using 'none'"),
            ),
            Parity::Space => (
                serialport::Parity::None,
                Some("parity 'space' is not supported by this backend, using 'none'"),
            ),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Flow control modes.
///
/// `DtrDsr` is accepted for configuration compatibility; the backend only
/// implements RTS/CTS hardware handshaking, so it degrades to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    RtsCts,
    DtrDsr,
}

impl FlowControl {
    /// Convert to the backend type, returning a warning message when the
    /// requested mode had to be degraded.
    pub fn to_backend(self) -> (serialport::FlowControl, Option<&'static str>) {
        match self {
            FlowControl::None => (serialport::FlowControl::None, None),
            FlowControl::Software => (serialport::FlowControl::Software, None),
            FlowControl::RtsCts => (serialport::FlowControl::Hardware, None),
            FlowControl::DtrDsr => (
                serialport::FlowControl::None,
                Some("flow control 'dtrdsr' is not supported by this backend, using 'none'"),
            ),
        }
    }
}

/// Trait for the open serial link pumped by a bridge session.
///
/// Reads are polled: a timeout with no data is reported as `Ok(0)`, never an
/// error, so pump loops can observe cancellation between reads.
pub trait SerialLink: Send {
    /// Read available bytes into `buffer`, returning within the link's poll
    /// timeout. `Ok(0)` means the timeout expired with nothing to read.
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write all of `data` to the link.
    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError>;

    /// The port name/path of this link.
    fn name(&self) -> &str;

    /// Clone the handle so each pump direction owns its own reads/writes.
    fn try_clone_link(&self) -> Result<Box<dyn SerialLink>, PortError>;
}
