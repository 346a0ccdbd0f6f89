//! Storage seam consumed by the pipeline and the manager.

use crate::db::DatabaseError;
use crate::model::{Document, DocumentId, MetadataEntry, MetadataValue, TagRef, User, UserId};
use crate::rules::{AutomaticRule, Rule, RuleError};

pub trait Store: Send + Sync {
    /// Loads a document together with its tags and metadata.
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, DatabaseError>;

    fn find_document_by_hash(&self, hash: &str) -> Result<Option<Document>, DatabaseError>;

    /// Inserts the document and returns its new id.
    fn insert_document(&self, doc: &Document) -> Result<DocumentId, DatabaseError>;

    fn delete_document(&self, id: DocumentId) -> Result<(), DatabaseError>;

    /// Persists scalar fields and replaces the tag and metadata associations
    /// with the ones on `doc`.
    fn update_document(&self, doc: &Document) -> Result<(), DatabaseError>;

    fn document_metadata(&self, id: DocumentId) -> Result<Vec<MetadataEntry>, DatabaseError>;

    fn document_tags(&self, id: DocumentId) -> Result<Vec<TagRef>, DatabaseError>;

    /// Metadata values of the user that carry an automatic match filter.
    fn filter_metadata_values(&self, user: UserId) -> Result<Vec<MetadataValue>, DatabaseError>;

    fn get_or_create_metadata_value(&self, key_id: i64, value: &str)
        -> Result<i64, DatabaseError>;

    /// Enabled user rules in stored order. Rules that cannot be decoded are
    /// returned as errors in their slot.
    fn active_rules(&self, user: UserId) -> Result<Vec<Result<Rule, RuleError>>, DatabaseError>;

    /// Enabled standalone automatic filter rules, decoded the same way.
    fn automatic_rules(
        &self,
        user: UserId,
    ) -> Result<Vec<Result<AutomaticRule, RuleError>>, DatabaseError>;

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>, DatabaseError>;

    fn ensure_user(&self, name: &str) -> Result<User, DatabaseError>;
}
