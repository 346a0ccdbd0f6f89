use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ProcessError, StorageError};
use crate::model::DocumentId;
use crate::search::SearchError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document processing failed: {0}")]
    Processing(#[from] ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Search indexing failed: {0}")]
    Search(#[from] SearchError),

    #[error("Document file '{path}' is unavailable: {source}")]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file type: {0}")]
    UnsupportedMimetype(String),

    #[error("'{0}' is not inside a user directory")]
    NoOwner(PathBuf),

    #[error("No user named '{0}'")]
    UnknownUser(String),

    #[error("Document {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("Content of document {document} now duplicates document {existing}")]
    DuplicateContent {
        document: DocumentId,
        existing: DocumentId,
    },
}
