use std::fmt;
use std::path::PathBuf;

use crate::model::{Document, DocumentId};

/// A unit of work handed to a worker queue.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A new file seen in the input directory.
    File(PathBuf),
    /// A stored document with pending steps, and where its content lives.
    Document { document: Document, path: PathBuf },
}

/// Identity used to keep an item from being scheduled twice at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkKey {
    File(PathBuf),
    Document(DocumentId),
}

impl WorkItem {
    pub fn key(&self) -> WorkKey {
        match self {
            WorkItem::File(path) => WorkKey::File(path.clone()),
            WorkItem::Document { document, .. } => WorkKey::Document(document.id),
        }
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        match self {
            WorkItem::File(_) => None,
            WorkItem::Document { document, .. } => Some(document.id),
        }
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKey::File(path) => write!(f, "file {}", crate::sanitize::redact_path(path)),
            WorkKey::Document(id) => write!(f, "document {}", id),
        }
    }
}

/// Outcome of one item, sent from a worker to the dispatcher for logging.
#[derive(Debug, Clone)]
pub enum WorkerReport {
    Finished { worker: usize, key: WorkKey },
    Failed { worker: usize, key: WorkKey, error: String },
    Panicked { worker: usize, key: WorkKey, message: String },
}
