//! crates/hospital_chat_core/src/dedup.rs
//!
//! Edge-side guard preventing duplicate in-flight submissions of the same
//! logical chat request.
//!
//! Chat sends are non-joinable: a second identical call while the first is
//! pending is rejected outright. An extra one-second cooldown rejects the
//! same literal text from the same caller even after the prior request has
//! already completed. Fingerprints are scoped by subject id, so identical
//! text from different users never collides.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Cooldown stamps older than this are pruned opportunistically.
const STAMP_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Soft "please wait" rejections, not true failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DedupError {
    #[error("An identical request is already in flight")]
    DuplicateInFlight,
    #[error("The same message was just sent; wait a moment before retrying")]
    Cooldown,
}

/// Marks one logical request as in flight; dropping it removes the marker,
/// so both completion and failure paths clear it immediately.
#[derive(Debug)]
pub struct InflightGuard {
    markers: Arc<DashMap<String, ()>>,
    fingerprint: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.markers.remove(&self.fingerprint);
    }
}

/// The pending-request map plus recent-send stamps. Explicitly constructed
/// and injected, never a module-level singleton, so tests get isolated
/// instances and teardown is clean.
pub struct RequestDeduplicator {
    markers: Arc<DashMap<String, ()>>,
    stamps: DashMap<String, Instant>,
    cooldown: Duration,
}

impl RequestDeduplicator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            markers: Arc::new(DashMap::new()),
            stamps: DashMap::new(),
            cooldown,
        }
    }

    /// Admits or rejects one chat send. On success the returned guard holds
    /// the in-flight marker until dropped.
    pub fn begin(&self, subject_id: &str, message: &str) -> Result<InflightGuard, DedupError> {
        self.begin_at(Instant::now(), subject_id, message)
    }

    fn begin_at(
        &self,
        now: Instant,
        subject_id: &str,
        message: &str,
    ) -> Result<InflightGuard, DedupError> {
        let fingerprint = fingerprint(subject_id, "chat/send", message);

        if let Some(stamp) = self.stamps.get(&fingerprint) {
            if now.duration_since(*stamp) < self.cooldown {
                // The in-flight marker may already be gone; the cooldown is
                // independent of it.
                return if self.markers.contains_key(&fingerprint) {
                    Err(DedupError::DuplicateInFlight)
                } else {
                    Err(DedupError::Cooldown)
                };
            }
        }

        match self.markers.entry(fingerprint.clone()) {
            Entry::Occupied(_) => Err(DedupError::DuplicateInFlight),
            Entry::Vacant(vacant) => {
                vacant.insert(());
                self.stamps.insert(fingerprint.clone(), now);
                self.prune(now);
                Ok(InflightGuard {
                    markers: Arc::clone(&self.markers),
                    fingerprint,
                })
            }
        }
    }

    fn prune(&self, now: Instant) {
        self.stamps
            .retain(|_, stamp| now.duration_since(*stamp) < STAMP_RETENTION);
    }
}

/// Fingerprint of one logical request: subject, route, and message body.
fn fingerprint(subject_id: &str, route: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject_id.as_bytes());
    hasher.update([0]);
    hasher.update(route.as_bytes());
    hasher.update([0]);
    hasher.update(message.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
