pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod processor;
pub mod rules;
pub mod sanitize;
pub mod search;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod worker;

pub use capability::{Registry, ToolAvailability};
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, DocflowError, ProcessError, Result, StorageError, WorkerError};
pub use logging::init_logging;
pub use model::{Document, Job, JobStatus, Step};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
pub use processor::{ContentTools, PdfText, SystemTools};
pub use search::{MemoryIndex, SearchIndex};
pub use store::Store;
pub use tracker::StepTracker;
pub use worker::{Manager, WorkerStatus};
