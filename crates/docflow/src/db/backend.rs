//! `Store` and `StepTracker` backed by the SQLite repositories.

use super::{
    document_repo, metadata_repo, rule_repo, step_repo, tag_repo, user_repo, Database,
    DatabaseError,
};
use crate::model::{
    Document, DocumentId, Job, MetadataEntry, MetadataValue, Step, TagRef, User, UserId,
};
use crate::rules::{AutomaticRule, Rule, RuleError};
use crate::store::Store;
use crate::tracker::StepTracker;

impl Store for Database {
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, DatabaseError> {
        document_repo::find_by_id(self, id)
    }

    fn find_document_by_hash(&self, hash: &str) -> Result<Option<Document>, DatabaseError> {
        document_repo::find_by_hash(self, hash)
    }

    fn insert_document(&self, doc: &Document) -> Result<DocumentId, DatabaseError> {
        document_repo::insert(self, doc)
    }

    fn delete_document(&self, id: DocumentId) -> Result<(), DatabaseError> {
        document_repo::delete(self, id)
    }

    fn update_document(&self, doc: &Document) -> Result<(), DatabaseError> {
        document_repo::update(self, doc)
    }

    fn document_metadata(&self, id: DocumentId) -> Result<Vec<MetadataEntry>, DatabaseError> {
        metadata_repo::for_document(self, id)
    }

    fn document_tags(&self, id: DocumentId) -> Result<Vec<TagRef>, DatabaseError> {
        tag_repo::for_document(self, id)
    }

    fn filter_metadata_values(&self, user: UserId) -> Result<Vec<MetadataValue>, DatabaseError> {
        metadata_repo::filter_values(self, user)
    }

    fn get_or_create_metadata_value(
        &self,
        key_id: i64,
        value: &str,
    ) -> Result<i64, DatabaseError> {
        metadata_repo::ensure_value(self, key_id, value)
    }

    fn active_rules(&self, user: UserId) -> Result<Vec<Result<Rule, RuleError>>, DatabaseError> {
        rule_repo::active_rules(self, user)
    }

    fn automatic_rules(
        &self,
        user: UserId,
    ) -> Result<Vec<Result<AutomaticRule, RuleError>>, DatabaseError> {
        rule_repo::automatic_rules(self, user)
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        user_repo::find_by_name(self, name)
    }

    fn ensure_user(&self, name: &str) -> Result<User, DatabaseError> {
        user_repo::ensure(self, name)
    }
}

impl StepTracker for Database {
    fn document_pending_steps(&self, id: DocumentId) -> Result<Vec<Step>, DatabaseError> {
        step_repo::pending_for_document(self, id)
    }

    fn pending_processing(&self) -> Result<Vec<(DocumentId, Step)>, DatabaseError> {
        step_repo::all_pending(self)
    }

    fn add_pending_steps(&self, id: DocumentId, steps: &[Step]) -> Result<(), DatabaseError> {
        step_repo::add_pending(self, id, steps)
    }

    fn start_process_item(
        &self,
        id: DocumentId,
        step: Step,
        message: &str,
    ) -> Result<Job, DatabaseError> {
        step_repo::start_job(self, id, step, message)
    }

    fn mark_processing_done(
        &self,
        id: DocumentId,
        step: Step,
        remove_from_pending: bool,
    ) -> Result<(), DatabaseError> {
        if remove_from_pending {
            step_repo::remove_pending(self, id, step)?;
        }
        Ok(())
    }

    fn update_job(&self, job: &Job) -> Result<(), DatabaseError> {
        step_repo::update_job(self, job)
    }

    fn cancel_running_processes(&self) -> Result<usize, DatabaseError> {
        step_repo::reset_running(self)
    }

    fn cancel_document_processing(&self, id: DocumentId) -> Result<(), DatabaseError> {
        step_repo::cancel_document(self, id)
    }
}
