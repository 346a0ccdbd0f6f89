#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use docflow::db::DatabaseError;
use docflow::error::ProcessError;
use docflow::model::{
    Document, DocumentId, Job, MetadataEntry, MetadataValue, Step, TagRef, User, UserId,
};
use docflow::rules::{AutomaticRule, Rule, RuleError};
use docflow::{ContentTools, Database, PdfText, StepTracker, Store};

/// Content marker that makes every extraction call panic.
pub const PANIC_MARKER: &str = "PANIC-NOW";

/// Stand-in for lopdf, Tesseract, pandoc and pdftoppm. Text extraction
/// returns the file's own bytes; thumbnails are a copy of the source.
#[derive(Default)]
pub struct FakeTools {
    pub fail_thumbnail: AtomicBool,
    pub fail_parse: AtomicBool,
    pub pdf_has_text: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, ProcessError> {
        if self.fail_parse.load(Ordering::SeqCst) {
            return Err(ProcessError::Conversion("simulated failure".to_string()));
        }
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        if String::from_utf8_lossy(&bytes).contains(PANIC_MARKER) {
            panic!("simulated tool crash");
        }
        Ok(bytes)
    }
}

impl ContentTools for FakeTools {
    fn extract_pdf_text(&self, path: &Path) -> Result<PdfText, ProcessError> {
        self.record("extract_pdf_text");
        let bytes = self.read(path)?;
        if self.pdf_has_text.load(Ordering::SeqCst) {
            Ok(PdfText::Text(String::from_utf8_lossy(&bytes).into_owned()))
        } else {
            Ok(PdfText::Empty)
        }
    }

    fn ocr_image(&self, path: &Path) -> Result<Vec<u8>, ProcessError> {
        self.record("ocr_image");
        self.read(path)
    }

    fn ocr_pdf(&self, path: &Path, work_dir: &Path) -> Result<Vec<u8>, ProcessError> {
        self.record("ocr_pdf");
        assert!(work_dir.is_dir());
        self.read(path)
    }

    fn convert_to_text(&self, path: &Path, _mimetype: &str) -> Result<Vec<u8>, ProcessError> {
        self.record("convert_to_text");
        self.read(path)
    }

    fn render_thumbnail(
        &self,
        path: &Path,
        _mimetype: &str,
        out_dir: &Path,
        _work_dir: &Path,
        _size: (u32, u32),
    ) -> Result<PathBuf, ProcessError> {
        self.record("render_thumbnail");
        if self.fail_thumbnail.load(Ordering::SeqCst) {
            return Err(ProcessError::Thumbnail("simulated failure".to_string()));
        }
        let out = out_dir.join("thumbnail.png");
        std::fs::copy(path, &out).map_err(|e| ProcessError::Thumbnail(e.to_string()))?;
        Ok(out)
    }
}

/// Delegates to the database and records each call in order.
pub struct RecordingTracker {
    db: Arc<Database>,
    calls: Mutex<Vec<String>>,
}

impl RecordingTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Steps started, in order, as `"<document>:<step>"`.
    pub fn started(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("start ").map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl StepTracker for RecordingTracker {
    fn document_pending_steps(&self, id: DocumentId) -> Result<Vec<Step>, DatabaseError> {
        self.record(format!("document_pending_steps {}", id));
        self.db.document_pending_steps(id)
    }

    fn pending_processing(&self) -> Result<Vec<(DocumentId, Step)>, DatabaseError> {
        self.record("pending_processing".to_string());
        self.db.pending_processing()
    }

    fn add_pending_steps(&self, id: DocumentId, steps: &[Step]) -> Result<(), DatabaseError> {
        self.record(format!("add_pending_steps {}", id));
        self.db.add_pending_steps(id, steps)
    }

    fn start_process_item(
        &self,
        id: DocumentId,
        step: Step,
        message: &str,
    ) -> Result<Job, DatabaseError> {
        self.record(format!("start {}:{}", id, step));
        self.db.start_process_item(id, step, message)
    }

    fn mark_processing_done(
        &self,
        id: DocumentId,
        step: Step,
        remove_from_pending: bool,
    ) -> Result<(), DatabaseError> {
        self.record(format!("done {}:{} remove={}", id, step, remove_from_pending));
        self.db.mark_processing_done(id, step, remove_from_pending)
    }

    fn update_job(&self, job: &Job) -> Result<(), DatabaseError> {
        self.db.update_job(job)
    }

    fn cancel_running_processes(&self) -> Result<usize, DatabaseError> {
        self.record("cancel_running_processes".to_string());
        self.db.cancel_running_processes()
    }

    fn cancel_document_processing(&self, id: DocumentId) -> Result<(), DatabaseError> {
        self.record(format!("cancel_document_processing {}", id));
        self.db.cancel_document_processing(id)
    }
}

/// Store whose hash lookup never finds anything, as seen by an ingest that
/// runs alongside another one for the same content.
pub struct BlindHashStore {
    db: Arc<Database>,
}

impl BlindHashStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl Store for BlindHashStore {
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, DatabaseError> {
        self.db.get_document(id)
    }

    fn find_document_by_hash(&self, _hash: &str) -> Result<Option<Document>, DatabaseError> {
        Ok(None)
    }

    fn insert_document(&self, doc: &Document) -> Result<DocumentId, DatabaseError> {
        self.db.insert_document(doc)
    }

    fn delete_document(&self, id: DocumentId) -> Result<(), DatabaseError> {
        self.db.delete_document(id)
    }

    fn update_document(&self, doc: &Document) -> Result<(), DatabaseError> {
        self.db.update_document(doc)
    }

    fn document_metadata(&self, id: DocumentId) -> Result<Vec<MetadataEntry>, DatabaseError> {
        self.db.document_metadata(id)
    }

    fn document_tags(&self, id: DocumentId) -> Result<Vec<TagRef>, DatabaseError> {
        self.db.document_tags(id)
    }

    fn filter_metadata_values(&self, user: UserId) -> Result<Vec<MetadataValue>, DatabaseError> {
        self.db.filter_metadata_values(user)
    }

    fn get_or_create_metadata_value(
        &self,
        key_id: i64,
        value: &str,
    ) -> Result<i64, DatabaseError> {
        self.db.get_or_create_metadata_value(key_id, value)
    }

    fn active_rules(&self, user: UserId) -> Result<Vec<Result<Rule, RuleError>>, DatabaseError> {
        self.db.active_rules(user)
    }

    fn automatic_rules(
        &self,
        user: UserId,
    ) -> Result<Vec<Result<AutomaticRule, RuleError>>, DatabaseError> {
        self.db.automatic_rules(user)
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        self.db.find_user_by_name(name)
    }

    fn ensure_user(&self, name: &str) -> Result<User, DatabaseError> {
        self.db.ensure_user(name)
    }
}
