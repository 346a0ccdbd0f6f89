use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::item::WorkKey;

/// Items currently queued or running anywhere in the pool. A key can be
/// claimed once until it is released.
#[derive(Debug, Default)]
pub struct InFlight {
    keys: Mutex<HashSet<WorkKey>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the key is already claimed.
    pub fn claim(&self, key: WorkKey) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    pub fn release(&self, key: &WorkKey) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn contains(&self, key: &WorkKey) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
