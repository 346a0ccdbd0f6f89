//! Per-document step bookkeeping.

use crate::db::DatabaseError;
use crate::model::{DocumentId, Job, Step};

pub trait StepTracker: Send + Sync {
    /// Pending steps of one document, in canonical order.
    fn document_pending_steps(&self, id: DocumentId) -> Result<Vec<Step>, DatabaseError>;

    /// Every (document, step) pair still pending, across all users.
    fn pending_processing(&self) -> Result<Vec<(DocumentId, Step)>, DatabaseError>;

    fn add_pending_steps(&self, id: DocumentId, steps: &[Step]) -> Result<(), DatabaseError>;

    /// Reactivates the latest awaiting job for (document, step) or creates a
    /// new one. The returned job is `Running`.
    fn start_process_item(
        &self,
        id: DocumentId,
        step: Step,
        message: &str,
    ) -> Result<Job, DatabaseError>;

    fn mark_processing_done(
        &self,
        id: DocumentId,
        step: Step,
        remove_from_pending: bool,
    ) -> Result<(), DatabaseError>;

    fn update_job(&self, job: &Job) -> Result<(), DatabaseError>;

    /// Startup recovery: every `Running` job becomes `Awaiting`. Returns the
    /// number of jobs reset.
    fn cancel_running_processes(&self) -> Result<usize, DatabaseError>;

    /// Fails the document's open jobs and clears its pending steps.
    fn cancel_document_processing(&self, id: DocumentId) -> Result<(), DatabaseError>;
}
