//! Fine-grained locking striped by key.
//!
//! A fixed table of async mutexes; a key hashes to one stripe. Two callers
//! locking the same key serialize; callers on different stripes proceed in
//! parallel. Distinct keys may share a stripe, which only costs extra
//! serialization, never correctness.

use std::hash::{DefaultHasher, Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Striped lock table. Scoped to the owner that constructs it — there is no
/// process-wide instance.
pub struct StripedLock {
    stripes: Vec<Mutex<()>>,
}

impl StripedLock {
    /// Create a table with `stripes` mutexes.
    ///
    /// # Panics
    ///
    /// Panics if `stripes` is zero.
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        assert!(stripes > 0, "stripe count must be non-zero");
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Acquire the stripe for `key`. The stripe is held until the returned
    /// guard is dropped, releasing on every exit path.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.index(key)].lock().await
    }

    fn index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        usize::try_from(hasher.finish() % self.stripes.len() as u64).unwrap_or(0)
    }
}
