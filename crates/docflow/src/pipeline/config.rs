use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// The slice of [`Config`] the pipeline needs at run time.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_directory: PathBuf,
    pub data_directory: PathBuf,
    pub thumbnail_size: (u32, u32),
    /// Pause after a failed step that is dropped from the pending set.
    pub failure_backoff: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            input_directory: PathBuf::from(&config.input_directory),
            data_directory: PathBuf::from(&config.data_directory),
            thumbnail_size: (config.thumbnail.width, config.thumbnail.height),
            failure_backoff: config.dispatch.failure_backoff(),
        }
    }
}
