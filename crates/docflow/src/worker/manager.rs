//! Owns the worker pool and the dispatcher thread.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, error, info, warn};

use super::inflight::InFlight;
use super::item::{WorkItem, WorkKey, WorkerReport};
use super::panic_guard;
use super::pool::{WorkerContext, WorkerPool};
use super::state::WorkerStatus;
use super::watcher::{self, InputWatcher};
use crate::config::{Config, DispatchConfig};
use crate::error::{DocflowError, WorkerError};
use crate::model::Document;
use crate::notify::Notifier;
use crate::pipeline::Pipeline;
use crate::sanitize::redact_path;

/// Poll interval of the input watcher.
const WATCH_POLL: Duration = Duration::from_secs(2);

const REPORT_CAPACITY: usize = 64;

struct Control {
    stop: Sender<()>,
    dispatcher: JoinHandle<()>,
}

/// State shared between the manager handle and the dispatcher thread.
struct Shared {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    in_flight: Arc<InFlight>,
    dispatch: DispatchConfig,
    input_directory: PathBuf,
    running: AtomicBool,
    deferred: Mutex<VecDeque<PathBuf>>,
}

pub struct Manager {
    shared: Arc<Shared>,
    notifier: Option<Arc<dyn Notifier>>,
    control: Mutex<Option<Control>>,
}

impl Manager {
    pub fn new(config: &Config, pipeline: Arc<Pipeline>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline,
                pool: WorkerPool::new(config.worker_count, config.queue_capacity),
                in_flight: Arc::new(InFlight::new()),
                dispatch: config.dispatch.clone(),
                input_directory: PathBuf::from(&config.input_directory),
                running: AtomicBool::new(false),
                deferred: Mutex::new(VecDeque::new()),
            }),
            notifier: None,
            control: Mutex::new(None),
        }
    }

    /// Sends panic reports to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Resets jobs interrupted by a previous crash, starts the workers and
    /// the input watcher, and launches the dispatcher. The dispatcher waits
    /// for the settle delay before its first scan and pull.
    pub fn start(&self) -> Result<(), WorkerError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyRunning);
        }

        let result = self.launch();
        if result.is_err() {
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.pool.stop(&self.shared.in_flight);
        }
        result
    }

    fn launch(&self) -> Result<(), WorkerError> {
        self.shared.recover_interrupted();

        let (report_tx, report_rx) = bounded(REPORT_CAPACITY);
        let ctx = WorkerContext {
            pipeline: Arc::clone(&self.shared.pipeline),
            in_flight: Arc::clone(&self.shared.in_flight),
            reports: report_tx,
            notifier: self.notifier.clone(),
            poll: self.shared.dispatch.worker_poll(),
        };
        self.shared.pool.start(&ctx)?;

        let watcher = InputWatcher::start(&self.shared.input_directory, WATCH_POLL)?;

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let shared = Arc::clone(&self.shared);
        let dispatcher = thread::Builder::new()
            .name("docflow-dispatcher".to_string())
            .spawn(move || dispatch_loop(&shared, watcher, report_rx, stop_rx))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        *self.control.lock().unwrap_or_else(PoisonError::into_inner) = Some(Control {
            stop: stop_tx,
            dispatcher,
        });
        info!("Manager started with {} workers", self.shared.pool.len());
        Ok(())
    }

    /// Stops the dispatcher and signals the workers. Items still running
    /// are not waited for.
    pub fn stop(&self) -> Result<(), WorkerError> {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return Err(WorkerError::NotRunning);
        }

        let control = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Control { stop, dispatcher }) = control {
            drop(stop);
            if dispatcher.join().is_err() {
                error!("Dispatcher exited with a panic");
            }
        }

        self.shared.pool.stop(&self.shared.in_flight);
        info!("Manager stopped");
        Ok(())
    }

    pub fn pull_documents_to_process(&self) -> Result<usize, DocflowError> {
        self.shared.pull_documents_to_process()
    }

    pub fn add_document_for_processing(&self, document: Document) -> Result<usize, WorkerError> {
        self.shared.add_document_for_processing(document)
    }

    /// Queues a raw file from the input directory for ingestion.
    pub fn schedule_file(&self, path: PathBuf) -> Result<usize, WorkerError> {
        self.shared.assign(WorkItem::File(path))
    }

    pub fn processing_status(&self) -> Vec<WorkerStatus> {
        self.shared.pool.statuses()
    }
}

impl Shared {
    fn recover_interrupted(&self) {
        match self.pipeline.tracker().cancel_running_processes() {
            Ok(0) => {}
            Ok(n) => info!("Reset {} interrupted job(s) to awaiting", n),
            Err(e) => warn!("Failed to reset interrupted jobs: {}", e),
        }
    }

    /// Schedules every document with pending steps that is not already
    /// queued or running. A no-op while every queue is full.
    fn pull_documents_to_process(&self) -> Result<usize, DocflowError> {
        if self.pool.is_saturated() {
            debug!("All worker queues are full, skipping pull");
            return Ok(0);
        }

        let pending = self.pipeline.tracker().pending_processing()?;
        let mut seen = HashSet::new();
        let mut scheduled = 0;

        for (id, _) in pending {
            if !seen.insert(id) || self.in_flight.contains(&WorkKey::Document(id)) {
                continue;
            }

            let document = match self.pipeline.store().get_document(id) {
                Ok(Some(document)) => document,
                Ok(None) => {
                    warn!("Pending steps reference missing document {}", id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to load document {}: {}", id, e);
                    continue;
                }
            };

            match self.add_document_for_processing(document) {
                Ok(_) => scheduled += 1,
                Err(WorkerError::AlreadyScheduled(_)) => {}
                Err(WorkerError::QueueFull) => {
                    debug!("Worker queues filled up, leaving the rest for the next pull");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if scheduled > 0 {
            info!("Scheduled {} document(s) with pending steps", scheduled);
        }
        Ok(scheduled)
    }

    fn pull_logged(&self) {
        if let Err(e) = self.pull_documents_to_process() {
            warn!("Pull of pending documents failed: {}", e);
        }
    }

    fn add_document_for_processing(&self, document: Document) -> Result<usize, WorkerError> {
        let path = self.pipeline.layout().document_path(&document);
        self.assign(WorkItem::Document { document, path })
    }

    /// Claims the item and queues it on the least loaded worker.
    fn assign(&self, item: WorkItem) -> Result<usize, WorkerError> {
        let key = item.key();
        if !self.in_flight.claim(key.clone()) {
            return Err(WorkerError::AlreadyScheduled(key.to_string()));
        }

        let result = if self.pool.is_saturated() {
            Err(WorkerError::QueueFull)
        } else {
            self.pool.dispatch(item)
        };

        match result {
            Ok(worker) => {
                debug!("Assigned {} to worker {}", key, worker);
                Ok(worker)
            }
            Err(e) => {
                self.in_flight.release(&key);
                Err(e)
            }
        }
    }

    fn on_file(&self, path: PathBuf) {
        if self.pipeline.registry().mimetype_for_path(&path).is_none() {
            debug!("Ignoring unsupported file {}", redact_path(&path));
            return;
        }

        match self.assign(WorkItem::File(path.clone())) {
            Ok(_) | Err(WorkerError::AlreadyScheduled(_)) => {}
            Err(WorkerError::QueueFull) => {
                let mut deferred = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
                if !deferred.contains(&path) {
                    debug!("Queues full, deferring {}", redact_path(&path));
                    deferred.push_back(path);
                }
            }
            Err(e) => warn!("Failed to schedule {}: {}", redact_path(&path), e),
        }
    }

    /// Retries files that arrived while every queue was full.
    fn retry_deferred(&self) {
        let batch: Vec<PathBuf> = self
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for path in batch {
            if path.exists() {
                self.on_file(path);
            }
        }
    }
}

enum Wake {
    Stop,
    Heartbeat,
    Pull,
    File(PathBuf),
    Report(WorkerReport),
}

fn dispatch_loop(
    shared: &Shared,
    watcher: InputWatcher,
    reports: Receiver<WorkerReport>,
    stop: Receiver<()>,
) {
    let config = shared.dispatch.clone();

    if stop_requested(&stop, config.settle_delay()) {
        return;
    }

    let startup = panic_guard::catch(|| {
        for path in watcher::scan(&shared.input_directory) {
            shared.on_file(path);
        }
        shared.pull_logged();
    });
    if let Err(e) = startup {
        error!("Initial scan failed: {}", e);
    }

    let heartbeat = tick(config.heartbeat());
    let pull = tick(config.pull_interval());
    let events = watcher.events().clone();

    loop {
        let wake = select! {
            recv(stop) -> _ => Wake::Stop,
            recv(heartbeat) -> _ => Wake::Heartbeat,
            recv(pull) -> _ => Wake::Pull,
            recv(events) -> event => match event {
                Ok(path) => Wake::File(path),
                Err(_) => Wake::Heartbeat,
            },
            recv(reports) -> report => match report {
                Ok(report) => Wake::Report(report),
                Err(_) => Wake::Heartbeat,
            },
        };

        let handled = panic_guard::catch(|| match wake {
            Wake::Stop => false,
            Wake::Heartbeat => {
                shared.retry_deferred();
                true
            }
            Wake::Pull => {
                shared.pull_logged();
                true
            }
            Wake::File(path) => {
                info!("New file detected: {}", redact_path(&path));
                shared.on_file(path);
                shared.pull_logged();
                true
            }
            Wake::Report(report) => {
                log_report(&report);
                true
            }
        });

        match handled {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => error!("Dispatcher iteration failed: {}", e),
        }

        if stop_requested(&stop, config.loop_delay()) {
            break;
        }
    }

    debug!("Dispatcher stopped");
    drop(watcher);
}

/// Waits up to `delay`; true if the stop channel fired or closed meanwhile.
fn stop_requested(stop: &Receiver<()>, delay: Duration) -> bool {
    select! {
        recv(stop) -> _ => true,
        default(delay) => false,
    }
}

fn log_report(report: &WorkerReport) {
    match report {
        WorkerReport::Finished { worker, key } => {
            debug!("Worker {} finished {}", worker, key)
        }
        WorkerReport::Failed { worker, key, error } => {
            info!("Worker {} gave up on {}: {}", worker, key, error)
        }
        WorkerReport::Panicked {
            worker,
            key,
            message,
        } => info!("Worker {} recovered from a panic on {}: {}", worker, key, message),
    }
}
