//! Isolated pipeline environment for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use docflow::capability::{Registry, ToolAvailability};
use docflow::config::DispatchConfig;
use docflow::db::{step_repo, user_repo};
use docflow::model::{Document, DocumentId, Job, Step, User};
use docflow::{Config, Database, Manager, MemoryIndex, Pipeline, PipelineConfig, Store};

use super::fakes::BlindHashStore;

use super::fakes::{FakeTools, RecordingTracker};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config: Config,
    pub db: Arc<Database>,
    pub tracker: Arc<RecordingTracker>,
    pub tools: Arc<FakeTools>,
    pub search: Arc<MemoryIndex>,
    pub pipeline: Arc<Pipeline>,
}

impl TestHarness {
    /// Two workers with two slots each, fast dispatcher timings and a user
    /// named `alice`.
    pub fn new() -> Self {
        Self::with_pool(2, 2)
    }

    pub fn with_pool(worker_count: usize, queue_capacity: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        let mut config = Config::new(
            input_dir.to_string_lossy().into_owned(),
            data_dir.to_string_lossy().into_owned(),
        );
        config.worker_count = worker_count;
        config.queue_capacity = queue_capacity;
        config.users = vec!["alice".to_string()];
        config.dispatch = DispatchConfig {
            heartbeat_ms: 20,
            pull_interval_secs: 1,
            loop_delay_ms: 5,
            settle_delay_ms: 10,
            failure_backoff_ms: 0,
            worker_poll_ms: 20,
        };

        let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
        let tracker = Arc::new(RecordingTracker::new(Arc::clone(&db)));
        let tools = Arc::new(FakeTools::new());
        let search = Arc::new(MemoryIndex::new());
        let registry = Arc::new(Registry::build(ToolAvailability::all()));

        let pipeline = Arc::new(Pipeline::new(
            PipelineConfig::from_config(&config),
            db.clone(),
            tracker.clone(),
            tools.clone(),
            search.clone(),
            registry,
        ));

        let harness = Self {
            temp_dir,
            input_dir,
            data_dir,
            config,
            db,
            tracker,
            tools,
            search,
            pipeline,
        };
        harness.user("alice");
        harness
    }

    /// A second pipeline over the same database, tools and directories whose
    /// duplicate lookup always misses.
    pub fn blind_pipeline(&self) -> Pipeline {
        Pipeline::new(
            PipelineConfig::from_config(&self.config),
            Arc::new(BlindHashStore::new(Arc::clone(&self.db))),
            self.tracker.clone(),
            self.tools.clone(),
            self.search.clone(),
            Arc::new(Registry::build(ToolAvailability::all())),
        )
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Creates the user and their input directory.
    pub fn user(&self, name: &str) -> User {
        std::fs::create_dir_all(self.input_dir.join(name)).expect("Failed to create user dir");
        user_repo::ensure(&self.db, name).expect("Failed to create user")
    }

    /// Writes `input/<user>/<filename>`.
    pub fn write_input(&self, user: &str, filename: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(user).join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Writes and ingests a file for `alice`, returning the new document.
    pub fn ingest(&self, filename: &str, content: &str) -> Document {
        let path = self.write_input("alice", filename, content);
        let id = self
            .pipeline
            .ingest_file(&path)
            .expect("Ingest failed")
            .expect("Ingest reported a duplicate");
        self.document(id)
    }

    pub fn document(&self, id: DocumentId) -> Document {
        self.db
            .get_document(id)
            .expect("Failed to load document")
            .expect("Document missing")
    }

    pub fn stored_path(&self, doc: &Document) -> PathBuf {
        self.pipeline.layout().document_path(doc)
    }

    /// Runs the pending steps of a document on the calling thread.
    pub fn process(&self, id: DocumentId) {
        let doc = self.document(id);
        let path = self.stored_path(&doc);
        self.pipeline
            .process_document(doc, path)
            .expect("Processing failed");
    }

    pub fn pending(&self, id: DocumentId) -> Vec<Step> {
        step_repo::pending_for_document(&self.db, id).expect("Failed to load pending steps")
    }

    pub fn jobs(&self, id: DocumentId) -> Vec<Job> {
        step_repo::jobs_for_document(&self.db, id).expect("Failed to load jobs")
    }

    pub fn manager(&self) -> Manager {
        Manager::new(&self.config, Arc::clone(&self.pipeline))
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    condition()
}
