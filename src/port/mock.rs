//! Mock serial link for testing.
//!
//! Simulates the polled-read behavior of a real port without hardware:
//! queued chunks come back one per read (preserving chunk boundaries), an
//! empty queue reads as a zero-byte timeout, and faults can be injected on
//! either direction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::error::PortError;
use super::traits::SerialLink;

#[derive(Debug, Default)]
struct MockLinkState {
    /// Chunks to be returned by read operations, one chunk per read.
    read_chunks: VecDeque<Vec<u8>>,
    /// Log of all writes, in order.
    write_log: Vec<Vec<u8>>,
    /// When set, every read fails as if the device vanished.
    fail_reads: bool,
    /// When set, every write fails as if the device vanished.
    fail_writes: bool,
}

/// Mock serial link. Clones share state, mirroring how a real handle is
/// `try_clone`d into each pump direction.
#[derive(Clone)]
pub struct MockSerialLink {
    name: String,
    state: Arc<Mutex<MockLinkState>>,
}

impl MockSerialLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockLinkState::default())),
        }
    }

    /// Queue one chunk; each queued chunk is delivered by one read call.
    pub fn push_read(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.read_chunks.push_back(data.to_vec());
    }

    /// Make all subsequent reads fail.
    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    /// Make all subsequent writes fail.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    /// All writes so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// All written bytes, concatenated in write order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().unwrap().write_log.concat()
    }

    /// Number of chunks still queued for reading.
    pub fn pending_reads(&self) -> usize {
        self.state.lock().unwrap().read_chunks.len()
    }
}

impl SerialLink for MockSerialLink {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_reads {
                return Err(PortError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "simulated serial read failure",
                )));
            }
            if let Some(mut chunk) = state.read_chunks.pop_front() {
                let n = chunk.len().min(buffer.len());
                buffer[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    // Put the tail back so nothing is lost on a small buffer.
                    let tail = chunk.split_off(n);
                    state.read_chunks.push_front(tail);
                }
                return Ok(n);
            }
        }
        // Stand in for the real port's read timeout without burning CPU.
        thread::sleep(Duration::from_millis(2));
        Ok(0)
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated serial write failure",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_link(&self) -> Result<Box<dyn SerialLink>, PortError> {
        Ok(Box::new(self.clone()))
    }
}

impl std::fmt::Debug for MockSerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialLink")
            .field("name", &self.name)
            .field("pending_reads", &self.pending_reads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_boundaries_are_preserved() {
        let mock = MockSerialLink::new("MOCK0");
        mock.push_read(b"Hel");
        mock.push_read(b"lo");

        let mut link = mock.clone();
        let mut buf = [0u8; 16];
        assert_eq!(link.read_chunk(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"Hel");
        assert_eq!(link.read_chunk(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(link.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn oversized_chunk_spills_into_next_read() {
        let mock = MockSerialLink::new("MOCK0");
        mock.push_read(b"abcdef");

        let mut link = mock.clone();
        let mut buf = [0u8; 4];
        assert_eq!(link.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(link.read_chunk(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn writes_are_logged_in_order() {
        let mock = MockSerialLink::new("MOCK0");
        let mut link = mock.clone();
        link.write_all_bytes(b"one").unwrap();
        link.write_all_bytes(b"two").unwrap();
        assert_eq!(mock.writes(), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(mock.written_bytes(), b"onetwo");
    }

    #[test]
    fn injected_faults_surface_on_both_directions() {
        let mock = MockSerialLink::new("MOCK0");
        let mut link = mock.clone();

        mock.fail_reads();
        let mut buf = [0u8; 8];
        assert!(link.read_chunk(&mut buf).is_err());

        mock.fail_writes();
        assert!(link.write_all_bytes(b"x").is_err());
    }

    #[test]
    fn clones_share_state() {
        let mock = MockSerialLink::new("MOCK0");
        let mut a = mock.try_clone_link().unwrap();
        a.write_all_bytes(b"via clone").unwrap();
        assert_eq!(mock.written_bytes(), b"via clone");
    }
}
