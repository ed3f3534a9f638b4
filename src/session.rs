//! Bridge session: pumps bytes between one open serial link and one
//! accepted TCP client until either side reaches a terminal condition.
//!
//! Two pump threads run concurrently, one per direction. Each owns its
//! direction's reads and writes exclusively; they share only the underlying
//! handles (the serial link is `try_clone`d, the socket split by role).
//! Cancellation is polled: both directions bound their blocking reads with
//! `POLL_TIMEOUT`, so a raised cancel flag is observed within one timeout
//! interval.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::port::{PortError, SerialLink, POLL_TIMEOUT};

/// How long the session waits for the surviving pump to unwind after the
/// first one terminates. Elapsing is not an error; the caller closes the
/// handles afterwards, so an abandoned pump cannot corrupt anything.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

/// Pump buffer size per direction.
const CHUNK_SIZE: usize = 8192;

/// Session-scoped cancellation signal, shared between the supervisor and
/// both pump loops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Terminal condition of one bridge session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The TCP peer closed or dropped the connection; the serial handle is
    /// untouched and ready for the next client.
    ClientClosed,
    /// A serial read or write failed mid-session; the caller must tear the
    /// handle down and re-run device acquisition.
    SerialLost(PortError),
    /// The external cancel signal ended the session.
    Cancelled,
}

/// How one pump loop ended.
enum PumpEnd {
    ClientClosed,
    ClientGone,
    SerialLost(PortError),
    Cancelled,
}

/// Pump until either direction terminates, then stop the sibling and return
/// the merged outcome. `SerialLost` always dominates: it must reach the
/// supervisor to force a reconnect cycle.
pub fn run(link: &dyn SerialLink, stream: TcpStream, cancel: &CancelToken) -> SessionOutcome {
    let reader_link = match link.try_clone_link() {
        Ok(l) => l,
        Err(e) => return SessionOutcome::SerialLost(e),
    };
    let writer_link = match link.try_clone_link() {
        Ok(l) => l,
        Err(e) => return SessionOutcome::SerialLost(e),
    };

    // The TCP read loop polls cancellation the same way the serial loop
    // does, bounded by the shared timeout.
    if let Err(e) = stream.set_read_timeout(Some(POLL_TIMEOUT)) {
        warn!("session setup failed: {e}");
        return SessionOutcome::ClientClosed;
    }
    let tcp_out = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("session setup failed: {e}");
            return SessionOutcome::ClientClosed;
        }
    };
    let tcp_in = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("session setup failed: {e}");
            return SessionOutcome::ClientClosed;
        }
    };

    let (tx, rx) = mpsc::channel();

    let serial_to_tcp = {
        let tx = tx.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let _ = tx.send(pump_serial_to_tcp(reader_link, tcp_out, &cancel));
        })
    };
    let tcp_to_serial = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            let _ = tx.send(pump_tcp_to_serial(tcp_in, writer_link, &cancel));
        })
    };

    // First terminal event decides the session; check for an external
    // cancel before raising the flag ourselves below.
    let first = rx.recv().unwrap_or(PumpEnd::Cancelled);
    let externally_cancelled = cancel.is_cancelled();

    cancel.cancel();
    // Unblock the sibling's socket I/O immediately; the serial side
    // unblocks by itself within one poll timeout.
    let _ = stream.shutdown(Shutdown::Both);

    let second = match rx.recv_timeout(SHUTDOWN_GRACE) {
        Ok(end) => Some(end),
        Err(RecvTimeoutError::Timeout) => {
            debug!("pump loop still winding down after grace period, abandoning it");
            None
        }
        Err(RecvTimeoutError::Disconnected) => None,
    };
    // Detach the pump threads; a stuck one unblocks within one poll timeout
    // and exits on the raised cancel flag.
    drop(serial_to_tcp);
    drop(tcp_to_serial);

    merge_outcome(first, second, externally_cancelled)
}

fn merge_outcome(first: PumpEnd, second: Option<PumpEnd>, cancelled: bool) -> SessionOutcome {
    for end in [Some(first), second].into_iter().flatten() {
        if let PumpEnd::SerialLost(cause) = end {
            return SessionOutcome::SerialLost(cause);
        }
    }
    if cancelled {
        SessionOutcome::Cancelled
    } else {
        SessionOutcome::ClientClosed
    }
}

/// Serial -> TCP. A zero-byte serial read is a poll timeout, not an error;
/// bytes are forwarded in the order read. A TCP write failure means the
/// client is gone and ends only this direction's relevance.
fn pump_serial_to_tcp(
    mut link: Box<dyn SerialLink>,
    mut tcp: TcpStream,
    cancel: &CancelToken,
) -> PumpEnd {
    let mut buf = [0u8; CHUNK_SIZE];
    while !cancel.is_cancelled() {
        let n = match link.read_chunk(&mut buf) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) => return PumpEnd::SerialLost(e),
        };
        if tcp.write_all(&buf[..n]).is_err() {
            return PumpEnd::ClientGone;
        }
    }
    PumpEnd::Cancelled
}

/// TCP -> serial. A zero-byte read is an orderly client close; each nonzero
/// read is written to the serial link in full before the next read. A
/// serial write failure is device loss.
fn pump_tcp_to_serial(
    mut tcp: TcpStream,
    mut link: Box<dyn SerialLink>,
    cancel: &CancelToken,
) -> PumpEnd {
    let mut buf = [0u8; CHUNK_SIZE];
    while !cancel.is_cancelled() {
        let n = match tcp.read(&mut buf) {
            Ok(0) => return PumpEnd::ClientClosed,
            Ok(n) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => return PumpEnd::ClientGone,
        };
        if let Err(e) = link.write_all_bytes(&buf[..n]) {
            return PumpEnd::SerialLost(e);
        }
    }
    PumpEnd::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lost(msg: &str) -> PumpEnd {
        PumpEnd::SerialLost(PortError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            msg.to_string(),
        )))
    }

    #[test]
    fn serial_loss_dominates_the_merge() {
        let outcome = merge_outcome(PumpEnd::ClientClosed, Some(lost("x")), false);
        assert!(matches!(outcome, SessionOutcome::SerialLost(_)));

        let outcome = merge_outcome(lost("x"), Some(PumpEnd::Cancelled), true);
        assert!(matches!(outcome, SessionOutcome::SerialLost(_)));
    }

    #[test]
    fn external_cancel_wins_over_client_close() {
        let outcome = merge_outcome(PumpEnd::Cancelled, Some(PumpEnd::Cancelled), true);
        assert!(matches!(outcome, SessionOutcome::Cancelled));
    }

    #[test]
    fn plain_client_close_is_client_closed() {
        let outcome = merge_outcome(PumpEnd::ClientClosed, Some(PumpEnd::Cancelled), false);
        assert!(matches!(outcome, SessionOutcome::ClientClosed));

        let outcome = merge_outcome(PumpEnd::ClientGone, None, false);
        assert!(matches!(outcome, SessionOutcome::ClientClosed));
    }
}
