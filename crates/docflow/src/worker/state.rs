use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;

use super::item::WorkKey;
use crate::model::DocumentId;

struct Current {
    key: WorkKey,
    document_id: Option<DocumentId>,
    started: Instant,
}

/// Flags and the current-item pointer of one worker, shared with the
/// manager for status reads.
pub struct WorkerState {
    id: usize,
    running: AtomicBool,
    idle: AtomicBool,
    current: RwLock<Option<Current>>,
}

/// Point-in-time view of a worker. Fields are read one at a time and may be
/// mutually stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub id: usize,
    pub running: bool,
    pub busy: bool,
    pub queued: usize,
    pub capacity: usize,
    pub current: Option<String>,
    pub document_id: Option<DocumentId>,
    pub elapsed_ms: Option<u64>,
}

impl WorkerState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            running: AtomicBool::new(false),
            idle: AtomicBool::new(true),
            current: RwLock::new(None),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    /// Marks the worker busy with `key` until the guard is dropped.
    pub fn begin(&self, key: WorkKey, document_id: Option<DocumentId>) -> BusyGuard<'_> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Current {
            key,
            document_id,
            started: Instant::now(),
        });
        self.idle.store(false, Ordering::SeqCst);
        BusyGuard { state: self }
    }

    /// Records the document a raw-file item turned into.
    pub fn set_document(&self, id: DocumentId) {
        if let Some(current) = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            current.document_id = Some(id);
        }
    }

    pub fn status(&self, queued: usize, capacity: usize) -> WorkerStatus {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        WorkerStatus {
            id: self.id,
            running: self.is_running(),
            busy: !self.is_idle(),
            queued,
            capacity,
            current: current.as_ref().map(|c| c.key.to_string()),
            document_id: current.as_ref().and_then(|c| c.document_id),
            elapsed_ms: current
                .as_ref()
                .map(|c| c.started.elapsed().as_millis() as u64),
        }
    }
}

/// Returns the worker to idle and clears its current item on drop.
pub struct BusyGuard<'a> {
    state: &'a WorkerState,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self
            .state
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.state.idle.store(true, Ordering::SeqCst);
    }
}
