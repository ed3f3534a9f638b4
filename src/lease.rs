//! Per-host instance slot leasing.
//!
//! Multiple bridge processes sharing one installation directory coordinate
//! through exclusive advisory file locks: slot ids 1..=256 are tried in
//! order and the first lockable slot wins. The OS releases advisory locks
//! when their holder dies, so a slot abandoned by a crashed process is
//! claimable without any cleanup step. The lease is acquired once at startup
//! and held for the process lifetime; the slot id keys the instance's config
//! section and default port/file names.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::BridgeError;

/// Highest slot id tried before giving up with `NoFreeSlot`.
pub const MAX_SLOTS: u16 = 256;

/// An exclusively held instance slot. Dropping the lease releases the lock
/// (best-effort; the OS reclaims it regardless when the process exits).
#[derive(Debug)]
pub struct InstanceLease {
    instance_id: u16,
    lock_file: File,
    lock_path: PathBuf,
}

impl InstanceLease {
    /// Claim the first free slot for the scope derived from `scope_seed`
    /// (normally the canonicalized installation path, so bridges installed
    /// in different directories never contend).
    pub fn acquire(scope_seed: &str) -> Result<Self, BridgeError> {
        let dir = std::env::temp_dir().join("serial-bridge-locks");
        Self::acquire_in(&dir, scope_seed)
    }

    /// Claim a slot with lock files under `dir`. Split out of `acquire` so
    /// tests can isolate their lock directories.
    pub fn acquire_in(dir: &Path, scope_seed: &str) -> Result<Self, BridgeError> {
        std::fs::create_dir_all(dir)?;
        let scope = scope_token(scope_seed);

        for instance_id in 1..=MAX_SLOTS {
            let lock_path = dir.join(format!("serial-bridge_{scope}_{instance_id}.lock"));
            let lock_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;

            if lock_file.try_lock_exclusive().is_ok() {
                debug!("instance slot {instance_id} claimed at {}", lock_path.display());
                let mut lease = Self {
                    instance_id,
                    lock_file,
                    lock_path,
                };
                lease.stamp_pid();
                return Ok(lease);
            }
        }

        Err(BridgeError::NoFreeSlot)
    }

    pub fn instance_id(&self) -> u16 {
        self.instance_id
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    // Purely informational, for an operator inspecting the lock directory.
    fn stamp_pid(&mut self) {
        let _ = self.lock_file.set_len(0);
        let _ = writeln!(self.lock_file, "{}", std::process::id());
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.lock_file);
    }
}

/// Short fixed-width scope token: the first 8 bytes of SHA-256 over the
/// seed, upper-hex.
fn scope_token(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_token_is_stable_and_fixed_width() {
        let a = scope_token("/opt/bridge");
        let b = scope_token("/opt/bridge");
        let c = scope_token("/opt/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn different_scopes_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let a = InstanceLease::acquire_in(dir.path(), "scope-a").unwrap();
        let b = InstanceLease::acquire_in(dir.path(), "scope-b").unwrap();
        assert_eq!(a.instance_id(), 1);
        assert_eq!(b.instance_id(), 1);
    }
}
