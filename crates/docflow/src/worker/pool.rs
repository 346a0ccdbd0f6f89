use std::cell::Cell;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use super::inflight::InFlight;
use super::item::{WorkItem, WorkKey, WorkerReport};
use super::panic_guard;
use super::scheduler::{self, WorkerLoad};
use super::state::{WorkerState, WorkerStatus};
use crate::error::WorkerError;
use crate::model::DocumentId;
use crate::notify::Notifier;
use crate::pipeline::{Pipeline, PipelineError};

/// Everything a worker thread needs besides its own queue.
#[derive(Clone)]
pub struct WorkerContext {
    pub pipeline: Arc<Pipeline>,
    pub in_flight: Arc<InFlight>,
    pub reports: Sender<WorkerReport>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub poll: Duration,
}

struct WorkerSlot {
    state: Arc<WorkerState>,
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Fixed set of workers, each with its own bounded queue.
pub struct WorkerPool {
    slots: Vec<WorkerSlot>,
    capacity: usize,
}

impl WorkerPool {
    /// Creates the queues. Threads are spawned by [`WorkerPool::start`].
    pub fn new(worker_count: usize, capacity: usize) -> Self {
        let slots = (0..worker_count)
            .map(|id| {
                let (sender, receiver) = bounded(capacity);
                WorkerSlot {
                    state: Arc::new(WorkerState::new(id)),
                    sender,
                    receiver,
                    thread: Mutex::new(None),
                }
            })
            .collect();
        Self { slots, capacity }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn start(&self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        for slot in &self.slots {
            let mut thread = slot.thread.lock().unwrap_or_else(PoisonError::into_inner);
            if thread.is_some() {
                continue;
            }

            slot.state.set_running(true);
            let state = Arc::clone(&slot.state);
            let receiver = slot.receiver.clone();
            let worker_ctx = ctx.clone();
            let handle = thread::Builder::new()
                .name(format!("docflow-worker-{}", state.id()))
                .spawn(move || run_worker(state, receiver, worker_ctx))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            *thread = Some(handle);
        }

        info!("Started {} workers", self.slots.len());
        Ok(())
    }

    /// Signals every worker to stop and drops queued items, releasing their
    /// claims. Items already running finish on their own; their threads are
    /// detached.
    pub fn stop(&self, in_flight: &InFlight) {
        info!("Stopping worker pool...");
        for slot in &self.slots {
            slot.state.set_running(false);
            for item in slot.receiver.try_iter() {
                in_flight.release(&item.key());
            }
            if let Some(handle) = slot
                .thread
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
            {
                if handle.is_finished() {
                    if handle.join().is_err() {
                        error!("Worker {} exited with a panic", slot.state.id());
                    }
                } else {
                    debug!("Worker {} still busy, detaching", slot.state.id());
                }
            }
        }
    }

    pub fn loads(&self) -> Vec<WorkerLoad> {
        self.slots
            .iter()
            .map(|slot| WorkerLoad {
                idle: slot.state.is_idle(),
                queued: slot.sender.len(),
                capacity: self.capacity,
            })
            .collect()
    }

    pub fn is_saturated(&self) -> bool {
        scheduler::is_saturated(&self.loads())
    }

    /// Queues `item` on the least loaded worker with room and returns its
    /// index. `QueueFull` means every queue is at capacity.
    pub fn dispatch(&self, item: WorkItem) -> Result<usize, WorkerError> {
        let index = scheduler::least_loaded(&self.loads()).ok_or(WorkerError::QueueFull)?;
        self.slots[index]
            .sender
            .try_send(item)
            .map_err(|e| match e {
                TrySendError::Full(_) => WorkerError::QueueFull,
                TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
            })?;
        Ok(index)
    }

    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.slots
            .iter()
            .map(|slot| slot.state.status(slot.sender.len(), self.capacity))
            .collect()
    }
}

fn run_worker(state: Arc<WorkerState>, receiver: Receiver<WorkItem>, ctx: WorkerContext) {
    debug!("Worker {} started", state.id());

    while state.is_running() {
        match receiver.recv_timeout(ctx.poll) {
            Ok(item) => handle_item(&state, item, &ctx),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Worker {} stopped", state.id());
}

/// Runs one item inside the panic guard and always releases its claims.
fn handle_item(state: &WorkerState, item: WorkItem, ctx: &WorkerContext) {
    let key = item.key();
    let worker = state.id();
    let created: Cell<Option<DocumentId>> = Cell::new(None);
    let _busy = state.begin(key.clone(), item.document_id());
    let claimed_document = item.document_id();

    let outcome = panic_guard::catch(|| match item {
        WorkItem::File(path) => ingest(ctx, state, &path, &created),
        WorkItem::Document { document, path } => ctx.pipeline.process_document(document, path),
    });

    let report = match outcome {
        Ok(Ok(())) => WorkerReport::Finished {
            worker,
            key: key.clone(),
        },
        Ok(Err(e)) => {
            warn!("Worker {} failed on {}: {}", worker, key, e);
            WorkerReport::Failed {
                worker,
                key: key.clone(),
                error: e.to_string(),
            }
        }
        Err(WorkerError::Panic { message, backtrace }) => {
            let document = claimed_document.or(created.get());
            recover_from_panic(ctx, worker, &key, document, &message, &backtrace);
            WorkerReport::Panicked {
                worker,
                key: key.clone(),
                message,
            }
        }
        Err(e) => WorkerReport::Failed {
            worker,
            key: key.clone(),
            error: e.to_string(),
        },
    };

    if let Some(id) = created.get() {
        ctx.in_flight.release(&WorkKey::Document(id));
    }
    ctx.in_flight.release(&key);

    if let Err(TrySendError::Full(report)) = ctx.reports.try_send(report) {
        debug!("Report channel full, dropping {:?}", report);
    }
}

fn ingest(
    ctx: &WorkerContext,
    state: &WorkerState,
    path: &Path,
    created: &Cell<Option<DocumentId>>,
) -> Result<(), PipelineError> {
    ctx.pipeline
        .ingest_file_with(path, |id| {
            if !ctx.in_flight.claim(WorkKey::Document(id)) {
                warn!("Document {} was already claimed by another worker", id);
            }
            created.set(Some(id));
            state.set_document(id);
        })
        .map(|_| ())
}

fn recover_from_panic(
    ctx: &WorkerContext,
    worker: usize,
    key: &WorkKey,
    document: Option<DocumentId>,
    message: &str,
    backtrace: &str,
) {
    error!(
        "Worker {} panicked on {}: {}\n{}",
        worker, key, message, backtrace
    );

    if let Some(notifier) = &ctx.notifier {
        notifier.notify_failure(
            &format!("docflow: worker {} panicked on {}", worker, key),
            &format!("{}\n\n{}", message, backtrace),
        );
    }

    if let Some(id) = document {
        if let Err(e) = ctx.pipeline.cancel_document(id) {
            error!("Failed to cancel document {} after panic: {}", id, e);
        }
    }
}
