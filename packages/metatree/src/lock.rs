//! Advisory lock guarding metadata mutation.
//!
//! The lock is a single marker file at the root. Its existence is the entire
//! lock state: there is no owner token, no lease and no queue. Acquisition
//! checks for the marker and creates it when absent, so two processes can
//! still both win under unlucky timing. It serializes cooperative writers
//! under moderate contention and nothing more.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use metatree_backend::{join, Backend};

use crate::{Error, Result};

/// File name of the lock marker.
pub const LOCK_FILENAME: &str = ".lock";

pub const DEFAULT_LOCK_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_BACKOFF: Duration = Duration::from_secs(3);

/// Bounded retry policy for lock acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockPolicy {
    /// Number of times the marker is checked before giving up.
    pub attempts: u32,
    /// Fixed delay between two checks.
    pub backoff: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOCK_ATTEMPTS,
            backoff: DEFAULT_LOCK_BACKOFF,
        }
    }
}

/// Marker-file lock for one root.
pub struct LockManager {
    backend: Arc<dyn Backend>,
    marker: String,
    enabled: bool,
    policy: LockPolicy,
    held: AtomicBool,
}

impl LockManager {
    pub fn new(backend: Arc<dyn Backend>, root: &str, enabled: bool, policy: LockPolicy) -> Self {
        Self {
            backend,
            marker: join(root, LOCK_FILENAME),
            enabled,
            policy,
            held: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether this process currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Whether any process holds the lock, i.e. the marker exists.
    pub fn is_locked(&self) -> Result<bool> {
        Ok(self.backend.exists(&self.marker)?)
    }

    /// Create the marker, waiting out contention.
    ///
    /// Succeeds immediately when locking is disabled. Backend failures while
    /// probing or creating the marker are not contention and propagate as-is.
    pub fn acquire(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            if !self.backend.exists(&self.marker)? {
                self.backend.touch(&self.marker)?;
                self.held.store(true, Ordering::SeqCst);
                log::debug!("Acquired lock {} on attempt {}", self.marker, attempt);
                return Ok(());
            }

            log::warn!(
                "Lock {} is taken (attempt {}/{})",
                self.marker,
                attempt,
                attempts
            );
            if attempt < attempts {
                thread::sleep(self.policy.backoff);
            }
        }

        Err(Error::LockTimeout {
            marker: self.marker.clone(),
            attempts,
        })
    }

    /// Remove the marker. Succeeds immediately when locking is disabled.
    pub fn release(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        self.backend.unlink(&self.marker)?;
        self.held.store(false, Ordering::SeqCst);
        log::debug!("Released lock {}", self.marker);
        Ok(())
    }

    /// Run `mutation` while holding the lock.
    ///
    /// The lock is released on every exit path. If both the mutation and the
    /// release fail, the mutation's error is returned.
    pub fn with_lock<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.acquire()?;
        let result = mutation();
        let released = self.release();

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(release_error)) => {
                log::warn!(
                    "Releasing {} after a failed mutation also failed: {}",
                    self.marker,
                    release_error
                );
                Err(error)
            }
        }
    }
}
