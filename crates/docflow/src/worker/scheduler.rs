//! Least-loaded worker selection.

/// Snapshot of one worker's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLoad {
    pub idle: bool,
    pub queued: usize,
    pub capacity: usize,
}

impl WorkerLoad {
    pub fn is_full(&self) -> bool {
        self.queued >= self.capacity
    }
}

/// Index of the worker that should take the next item: the first idle
/// worker, otherwise the one with the shortest queue. Ties go to the lowest
/// index. Workers with a full queue are passed over, so `None` means the
/// pool is saturated.
pub fn least_loaded(loads: &[WorkerLoad]) -> Option<usize> {
    let open = || loads.iter().enumerate().filter(|(_, l)| !l.is_full());
    if let Some((idle, _)) = open().find(|(_, l)| l.idle) {
        return Some(idle);
    }
    open().min_by_key(|(i, l)| (l.queued, *i)).map(|(i, _)| i)
}

/// True when every queue is at capacity. An empty pool counts as saturated.
pub fn is_saturated(loads: &[WorkerLoad]) -> bool {
    loads.iter().all(WorkerLoad::is_full)
}
