//! Crawl-wide set of admitted URLs

use crate::url::VisitedKey;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe set of visited keys
///
/// Admission is a single atomic check-and-insert, so exactly one of any number
/// of concurrent callers presenting the same key wins.
#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: Mutex<HashSet<VisitedKey>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key`, returning true only if it was not present before
    pub fn try_admit(&self, key: VisitedKey) -> bool {
        self.lock().insert(key)
    }

    pub fn contains(&self, key: &VisitedKey) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<VisitedKey>> {
        // A panicking holder cannot leave a HashSet half-inserted.
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
