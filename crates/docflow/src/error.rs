use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    #[error("Failed to install signal handler: {0}")]
    Signal(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported mimetype: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Format conversion failed: {0}")]
    Conversion(String),

    #[error("Thumbnail rendering failed: {0}")]
    Thumbnail(String),

    #[error("External tool '{0}' is not available")]
    ToolMissing(&'static str),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Manager is already running")]
    AlreadyRunning,

    #[error("Manager is not running")]
    NotRunning,

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Every worker queue is full")]
    QueueFull,

    #[error("Work item is already scheduled: {0}")]
    AlreadyScheduled(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("No user named '{0}' owns the input directory")]
    UnknownUser(String),

    #[error("Worker panicked: {message}")]
    Panic { message: String, backtrace: String },
}

pub type Result<T> = std::result::Result<T, DocflowError>;
