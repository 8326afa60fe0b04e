//! Identifier tracking across repeated fetches of a feed.
//!
//! Decoders consult an [`IdentityStore`] while assembling items so that a
//! story delivered by an earlier fetch is not delivered again. The store is a
//! cheaply clonable handle: create one per logical feed, or clone a single
//! handle across feeds to opt into shared scoping. It is never ambient
//! process state — unrelated feeds cannot collide on identifiers unless the
//! caller wires them to the same store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A concurrency-safe set of item identifiers already delivered.
///
/// `seen` is an atomic check-and-record: when several parses race on the same
/// identifier, exactly one observes "not seen" and every other caller,
/// concurrent or later, observes "seen".
#[derive(Debug, Clone)]
pub struct IdentityStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    known: Mutex<HashSet<String>>,
    caching: AtomicBool,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                known: Mutex::new(HashSet::new()),
                caching: AtomicBool::new(true),
            }),
        }
    }

    /// Checks whether `id` was already recorded, recording it if not.
    ///
    /// Returns `true` if the identifier was known before this call. With
    /// caching disabled, always reports "not seen" and records nothing.
    pub fn seen(&self, id: &str) -> bool {
        if !self.caching() {
            return false;
        }
        let mut known = self
            .inner
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        !known.insert(id.to_string())
    }

    /// Whether `id` has been recorded, without recording it.
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Enables or disables identifier recording.
    ///
    /// Intended for test isolation: while disabled, every lookup reports
    /// "not seen" and nothing is recorded. Identifiers recorded earlier are
    /// kept and visible again once re-enabled.
    pub fn set_caching(&self, enabled: bool) {
        self.inner.caching.store(enabled, Ordering::SeqCst);
    }

    pub fn caching(&self) -> bool {
        self.inner.caching.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
