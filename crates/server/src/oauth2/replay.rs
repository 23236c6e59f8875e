//! Short-lived index of redeemed authorization codes.
//!
//! Codes are self-contained signed values, so nothing in the store records that one was
//! used. This set remembers a digest of each redeemed code's signature until the code
//! would have expired anyway; a second redemption inside that window is refused.

use dashmap::{DashMap, mapref::entry::Entry};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ConsumedCodes {
    entries: Arc<DashMap<String, OffsetDateTime>>,
    last_cleanup: Arc<Mutex<Instant>>,
}

impl Default for ConsumedCodes {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumedCodes {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            last_cleanup: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn key(code: &str) -> String {
        let signature = code.rsplit('.').next().unwrap_or(code);
        hex::encode(Sha256::digest(signature.as_bytes()))
    }

    /// Record `code` as redeemed. Returns `false` if it was already redeemed and has
    /// not yet expired.
    pub fn consume(&self, code: &str, expires_at: OffsetDateTime) -> bool {
        self.maybe_cleanup();

        let now = OffsetDateTime::now_utc();
        match self.entries.entry(Self::key(code)) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return false;
                }
                entry.insert(expires_at);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_cleanup(&self) {
        if let Ok(mut last_cleanup) = self.last_cleanup.try_lock()
            && last_cleanup.elapsed() >= CLEANUP_INTERVAL
        {
            *last_cleanup = Instant::now();
            drop(last_cleanup);
            self.purge_expired();
        }
    }

    /// Drop entries whose code has expired.
    pub fn purge_expired(&self) {
        let now = OffsetDateTime::now_utc();
        self.entries.retain(|_, expires_at| *expires_at > now);
    }
}
