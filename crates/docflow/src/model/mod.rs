//! Core records shared by the pipeline, the rule engine and storage.

pub mod document;
pub mod step;

pub use document::{Document, MetadataEntry, MetadataValue, TagRef, User};
pub use step::{Job, JobStatus, Step, UnknownStep};

pub type DocumentId = i64;
pub type UserId = i64;
