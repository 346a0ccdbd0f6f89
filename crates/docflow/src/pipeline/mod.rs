//! Step execution for a single document.

pub mod config;
pub mod context;
pub mod error;
mod job;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use runner::{Pipeline, INGEST_STEPS};
