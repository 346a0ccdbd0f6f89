use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub input_directory: String,
    pub data_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Users provisioned at startup. Each owns `<input_directory>/<name>/`.
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    (num_cpus::get() / 2).max(1)
}

fn default_queue_capacity() -> usize {
    5
}

impl Config {
    /// A configuration with every optional section at its default.
    pub fn new(input_directory: impl Into<String>, data_directory: impl Into<String>) -> Self {
        Self {
            version: "1.0".to_string(),
            input_directory: input_directory.into(),
            data_directory: data_directory.into(),
            database_path: None,
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            users: Vec::new(),
            ocr: OcrConfig::default(),
            tools: ToolsConfig::default(),
            thumbnail: ThumbnailConfig::default(),
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_directory).join("docflow.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
        }
    }
}

/// Names or paths of the external binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_pandoc")]
    pub pandoc: String,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: String,
}

fn default_pandoc() -> String {
    "pandoc".to_string()
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pandoc: default_pandoc(),
            pdftoppm: default_pdftoppm(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumb_width")]
    pub width: u32,
    #[serde(default = "default_thumb_height")]
    pub height: u32,
}

fn default_thumb_width() -> u32 {
    300
}

fn default_thumb_height() -> u32 {
    400
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: default_thumb_width(),
            height: default_thumb_height(),
        }
    }
}

/// Timing of the dispatcher and worker loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_pull_interval_secs")]
    pub pull_interval_secs: u64,
    #[serde(default = "default_loop_delay_ms")]
    pub loop_delay_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,
    #[serde(default = "default_worker_poll_ms")]
    pub worker_poll_ms: u64,
}

fn default_heartbeat_ms() -> u64 {
    1000
}

fn default_pull_interval_secs() -> u64 {
    30
}

fn default_loop_delay_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_failure_backoff_ms() -> u64 {
    1000
}

fn default_worker_poll_ms() -> u64 {
    500
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: default_heartbeat_ms(),
            pull_interval_secs: default_pull_interval_secs(),
            loop_delay_ms: default_loop_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            worker_poll_ms: default_worker_poll_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_secs(self.pull_interval_secs)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }

    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
