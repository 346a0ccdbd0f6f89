//! Job record bookkeeping around a single step.

use std::time::Duration;

use chrono::Utc;

use crate::db::DatabaseError;
use crate::model::{Job, JobStatus, Step};
use crate::tracker::StepTracker;

/// Open job for one (document, step). Completion runs on drop, so a step
/// that returns early or unwinds still closes its job and settles the
/// pending entry.
///
/// A job dropped while still `Running` is recorded as `Failure`. The step
/// leaves the pending set on success, and on failure only when
/// [`Step::removed_on_failure`] says so; those failures also pause for the
/// configured backoff.
pub(crate) struct StepJob<'a> {
    tracker: &'a dyn StepTracker,
    job: Job,
    backoff: Duration,
}

impl<'a> StepJob<'a> {
    pub fn begin(
        tracker: &'a dyn StepTracker,
        document_id: i64,
        step: Step,
        message: &str,
        backoff: Duration,
    ) -> Result<Self, DatabaseError> {
        let job = tracker.start_process_item(document_id, step, message)?;
        Ok(Self {
            tracker,
            job,
            backoff,
        })
    }

    pub fn finish(&mut self, message: impl Into<String>) {
        self.job.status = JobStatus::Finished;
        self.job.message = message.into();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.job.status = JobStatus::Failure;
        self.job.message = message.into();
    }
}

impl Drop for StepJob<'_> {
    fn drop(&mut self) {
        if self.job.status == JobStatus::Running {
            self.job.status = JobStatus::Failure;
            if self.job.message.is_empty() {
                self.job.message = "step did not complete".to_string();
            }
        }
        self.job.stopped_at = Some(Utc::now());

        let succeeded = self.job.status == JobStatus::Finished;
        let remove = succeeded || self.job.step.removed_on_failure();

        if let Err(e) = self.tracker.update_job(&self.job) {
            log::error!(
                "Failed to record {} job for document {}: {}",
                self.job.step,
                self.job.document_id,
                e
            );
        }
        if let Err(e) =
            self.tracker
                .mark_processing_done(self.job.document_id, self.job.step, remove)
        {
            log::error!(
                "Failed to settle pending {} for document {}: {}",
                self.job.step,
                self.job.document_id,
                e
            );
        }

        if !succeeded && remove && !self.backoff.is_zero() {
            std::thread::sleep(self.backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{document_repo, step_repo, user_repo, Database};
    use crate::model::Document;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = user_repo::ensure(&db, "alice").unwrap();
        let id = document_repo::insert(
            &db,
            &Document::new(user.id, "a.pdf", "application/pdf", 1, "h"),
        )
        .unwrap();
        step_repo::add_pending(&db, id, &Step::ALL).unwrap();
        (db, id)
    }

    #[test]
    fn test_finished_step_leaves_pending_set() {
        let (db, id) = setup();
        {
            let mut job = StepJob::begin(&db, id, Step::Hash, "hashing", Duration::ZERO).unwrap();
            job.finish("done");
        }

        let jobs = step_repo::jobs_for_document(&db, id).unwrap();
        assert_eq!(jobs[0].status, JobStatus::Finished);
        assert_eq!(jobs[0].message, "done");
        assert!(jobs[0].stopped_at.is_some());
        assert!(!step_repo::pending_for_document(&db, id)
            .unwrap()
            .contains(&Step::Hash));
    }

    #[test]
    fn test_failed_step_retention_depends_on_step() {
        let (db, id) = setup();
        {
            let mut job = StepJob::begin(&db, id, Step::Hash, "", Duration::ZERO).unwrap();
            job.fail("boom");
        }
        {
            let mut job = StepJob::begin(&db, id, Step::Thumbnail, "", Duration::ZERO).unwrap();
            job.fail("boom");
        }

        let pending = step_repo::pending_for_document(&db, id).unwrap();
        assert!(pending.contains(&Step::Hash));
        assert!(!pending.contains(&Step::Thumbnail));
    }

    #[test]
    fn test_abandoned_job_is_recorded_as_failure() {
        let (db, id) = setup();
        drop(StepJob::begin(&db, id, Step::ParseContent, "", Duration::ZERO).unwrap());

        let jobs = step_repo::jobs_for_document(&db, id).unwrap();
        assert_eq!(jobs[0].status, JobStatus::Failure);
        assert_eq!(jobs[0].message, "step did not complete");
        assert!(step_repo::pending_for_document(&db, id)
            .unwrap()
            .contains(&Step::ParseContent));
    }
}
