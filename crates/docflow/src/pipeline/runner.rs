use std::fs;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::capability::{ContentKind, Registry};
use crate::error::StorageError;
use crate::model::{Document, DocumentId, Step, User};
use crate::processor::{ContentTools, PdfText};
use crate::rules::{self, RuleError};
use crate::sanitize;
use crate::search::SearchIndex;
use crate::storage::{self, FileLayout};
use crate::store::Store;
use crate::tracker::StepTracker;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::job::StepJob;

/// Steps queued for a freshly ingested file. Hashing happened during ingest.
pub const INGEST_STEPS: [Step; 4] = [
    Step::Thumbnail,
    Step::ParseContent,
    Step::Rules,
    Step::IndexForSearch,
];

/// Runs processing steps for one document at a time. Shared by all workers.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn Store>,
    tracker: Arc<dyn StepTracker>,
    tools: Arc<dyn ContentTools>,
    search: Arc<dyn SearchIndex>,
    registry: Arc<Registry>,
    layout: FileLayout,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn Store>,
        tracker: Arc<dyn StepTracker>,
        tools: Arc<dyn ContentTools>,
        search: Arc<dyn SearchIndex>,
        registry: Arc<Registry>,
    ) -> Self {
        let layout = FileLayout::new(&config.data_directory);
        Self {
            config,
            store,
            tracker,
            tools,
            search,
            registry,
            layout,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<dyn StepTracker> {
        &self.tracker
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Runs every pending step of `document`, reading the file at `path`.
    ///
    /// Step failures are recorded on their jobs and do not fail the run. If
    /// the file cannot be opened, processing of the document is cancelled.
    pub fn process_document(&self, document: Document, path: PathBuf) -> Result<(), PipelineError> {
        let filename = sanitize::redact_path(&path);
        let _pipeline_span = info_span!("pipeline",
            document_id = document.id,
            filename = %filename,
        )
        .entered();

        let id = document.id;
        let steps = self.tracker.document_pending_steps(id)?;
        if steps.is_empty() {
            debug!("Document {} has no pending steps", id);
            return Ok(());
        }

        let mut document = document;
        document.metadata = self.store.document_metadata(id)?;
        document.tags = self.store.document_tags(id)?;

        let mut ctx = match PipelineContext::open(document, path) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!("Cannot open document {}: {}", id, e);
                if let Err(cancel_err) = self.cancel_document(id) {
                    error!("Failed to cancel document {}: {}", id, cancel_err);
                }
                return Err(e);
            }
        };

        let mut failed = 0;
        for step in Step::in_canonical_order(steps) {
            if !self.run_step(&mut ctx, step) {
                failed += 1;
            }
        }

        if failed == 0 {
            info!("Document {} processed", id);
        } else {
            info!("Document {} processed with {} failed step(s)", id, failed);
        }
        Ok(())
    }

    /// Ingests a new file from the input directory. See [`Self::ingest_file_with`].
    pub fn ingest_file(&self, path: &Path) -> Result<Option<DocumentId>, PipelineError> {
        self.ingest_file_with(path, |_| {})
    }

    /// Ingests a new file: hashes it, creates the document, moves the file
    /// into content-addressed storage and queues [`INGEST_STEPS`]. Thumbnail
    /// and text extraction run right away; the rest is left to the next pull.
    ///
    /// `on_insert` runs after the document row exists and before its steps
    /// are queued. Returns `None` when the content is already stored.
    pub fn ingest_file_with<F>(
        &self,
        path: &Path,
        on_insert: F,
    ) -> Result<Option<DocumentId>, PipelineError>
    where
        F: FnOnce(DocumentId),
    {
        let filename = sanitize::redact_path(path);
        let _ingest_span = info_span!("ingest", filename = %filename).entered();

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::UnsupportedMimetype(filename.clone()))?;
        let mimetype = self
            .registry
            .mimetype_for_path(path)
            .filter(|m| self.registry.is_supported(m, name))
            .ok_or_else(|| PipelineError::UnsupportedMimetype(filename.clone()))?;

        let hash = storage::hash_file(path)?;
        if let Some(existing) = self.store.find_document_by_hash(&hash)? {
            info!("{} duplicates document {}, skipping", filename, existing.id);
            return Ok(None);
        }

        let owner = self.owner_of(path)?;
        let size = fs::metadata(path)
            .map_err(|e| PipelineError::FileUnavailable {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();

        let mut document = Document::new(owner.id, name, &mimetype, size, &hash);
        let stored = self
            .layout
            .content_path(&hash, document.extension().as_deref());

        // The row owns the hash; only its inserter may write the stored file.
        document.id = match self.store.insert_document(&document) {
            Ok(id) => id,
            Err(e) if e.is_constraint_violation() => {
                match self.store.find_document_by_hash(&hash)? {
                    Some(existing) => {
                        info!("{} duplicates document {}, skipping", filename, existing.id);
                        return Ok(None);
                    }
                    None => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = storage::move_file(path, &stored) {
            if let Err(delete_err) = self.store.delete_document(document.id) {
                error!(
                    "Failed to remove document {} after a failed move: {}",
                    document.id, delete_err
                );
            }
            return Err(e.into());
        }
        on_insert(document.id);
        self.tracker.add_pending_steps(document.id, &INGEST_STEPS)?;
        info!(
            "Ingested {} as document {} for user {}",
            filename, document.id, owner.name
        );

        let id = document.id;
        let mut ctx = PipelineContext::open(document, stored)?;
        self.run_step(&mut ctx, Step::Thumbnail);
        self.run_step(&mut ctx, Step::ParseContent);
        Ok(Some(id))
    }

    /// Fails the open jobs of the document, drops its pending steps and
    /// marks its name and description with the error marker.
    pub fn cancel_document(&self, id: DocumentId) -> Result<(), PipelineError> {
        self.tracker.cancel_document_processing(id)?;
        let mut document = self
            .store
            .get_document(id)?
            .ok_or(PipelineError::DocumentNotFound(id))?;
        document.mark_failed();
        self.store.update_document(&document)?;
        warn!("Processing of document {} cancelled", id);
        Ok(())
    }

    /// The user owning a file is named by the first directory below the
    /// input directory, or by the parent directory for files outside it.
    fn owner_of(&self, path: &Path) -> Result<User, PipelineError> {
        let from_input = path
            .strip_prefix(&self.config.input_directory)
            .ok()
            .and_then(|rel| {
                let mut components = rel.components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(dir)), Some(_)) => dir.to_str(),
                    _ => None,
                }
            });
        let dir_name = from_input
            .or_else(|| {
                path.parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
            })
            .ok_or_else(|| PipelineError::NoOwner(path.to_path_buf()))?;

        self.store
            .find_user_by_name(dir_name)?
            .ok_or_else(|| PipelineError::UnknownUser(dir_name.to_string()))
    }

    /// Runs one step under its job record. Returns whether it succeeded.
    fn run_step(&self, ctx: &mut PipelineContext, step: Step) -> bool {
        let _step_span = info_span!("step", step = %step).entered();
        let id = ctx.document.id;

        let mut job = match StepJob::begin(
            self.tracker.as_ref(),
            id,
            step,
            &format!("{} started", step),
            self.config.failure_backoff,
        ) {
            Ok(job) => job,
            Err(e) => {
                error!("Cannot start {} for document {}: {}", step, id, e);
                return false;
            }
        };

        let result = match step {
            Step::Hash => self.step_hash(ctx),
            Step::Thumbnail => self.step_thumbnail(ctx),
            Step::ParseContent => self.step_parse_content(ctx),
            Step::Rules => self.step_rules(ctx),
            Step::IndexForSearch => self.step_index(ctx),
        };

        match result {
            Ok(message) => {
                debug!("{} for document {}: {}", step, id, message);
                job.finish(message);
                true
            }
            Err(e) => {
                warn!("{} failed for document {}: {}", step, id, e);
                job.fail(e.to_string());
                false
            }
        }
    }

    /// Re-hashes the file and moves it when the content changed.
    fn step_hash(&self, ctx: &mut PipelineContext) -> Result<String, PipelineError> {
        let current = ctx.path().to_path_buf();
        let hash = storage::hash_reader(BufReader::new(ctx.file()?)).map_err(|e| {
            StorageError::ReadFile {
                path: current.clone(),
                source: e,
            }
        })?;

        if hash == ctx.document.hash {
            return Ok("content unchanged".to_string());
        }

        if let Some(existing) = self.store.find_document_by_hash(&hash)? {
            if existing.id != ctx.document.id {
                return Err(PipelineError::DuplicateContent {
                    document: ctx.document.id,
                    existing: existing.id,
                });
            }
        }

        let target = self
            .layout
            .content_path(&hash, ctx.document.extension().as_deref());
        storage::move_file(&current, &target)?;

        let previous = std::mem::replace(&mut ctx.document.hash, hash);
        if let Ok(meta) = fs::metadata(&target) {
            ctx.document.size = meta.len();
        }
        if let Err(e) = self.store.update_document(&ctx.document) {
            ctx.document.hash = previous;
            if let Err(move_err) = storage::move_file(&target, &current) {
                error!("Failed to move content back: {}", move_err);
            }
            return Err(e.into());
        }

        ctx.reopen(target)?;
        Ok(format!("content changed, stored as {}", ctx.document.hash))
    }

    fn step_thumbnail(&self, ctx: &mut PipelineContext) -> Result<String, PipelineError> {
        let out_dir = self.layout.thumbnail_dir(ctx.document.id);
        storage::ensure_directory(&out_dir)?;

        let work_dir = ctx.scratch("thumbnail")?;
        let thumbnail = self.tools.render_thumbnail(
            ctx.path(),
            &ctx.document.mimetype,
            &out_dir,
            &work_dir,
            self.config.thumbnail_size,
        )?;
        Ok(format!("thumbnail written to {}", thumbnail.display()))
    }

    /// Extracts text: embedded PDF text with OCR fallback, OCR for images,
    /// conversion for office and markup formats.
    fn step_parse_content(&self, ctx: &mut PipelineContext) -> Result<String, PipelineError> {
        let source = ctx.path().to_path_buf();
        let mimetype = ctx.document.mimetype.clone();

        let raw = match self.registry.content_kind(&mimetype) {
            ContentKind::Pdf => match self.tools.extract_pdf_text(&source)? {
                PdfText::Text(text) => text.into_bytes(),
                PdfText::Empty => {
                    debug!("No usable embedded text, running OCR");
                    let work_dir = ctx.scratch("ocr")?;
                    self.tools.ocr_pdf(&source, &work_dir)?
                }
            },
            ContentKind::Image => self.tools.ocr_image(&source)?,
            ContentKind::Convertible => self.tools.convert_to_text(&source, &mimetype)?,
            ContentKind::Unsupported => return Err(PipelineError::UnsupportedMimetype(mimetype)),
        };

        ctx.document.content = sanitize::sanitize_text(&raw);
        self.store.update_document(&ctx.document)?;
        Ok(format!(
            "extracted {} characters",
            ctx.document.content.chars().count()
        ))
    }

    /// Automatic filters first (only for mimetypes with text), then the
    /// user's rules in stored order. A broken rule is logged and skipped.
    fn step_rules(&self, ctx: &mut PipelineContext) -> Result<String, PipelineError> {
        let doc = &mut ctx.document;
        let user = doc.user_id;
        let mut filters_matched = 0;

        if self.registry.has_text(&doc.mimetype) {
            let values = self.store.filter_metadata_values(user)?;
            let before = doc.metadata.len();
            for (value_id, e) in rules::match_metadata(&values, doc) {
                warn!("Metadata filter on value {} failed: {}", value_id, e);
            }
            filters_matched += doc.metadata.len() - before;

            for rule in self.store.automatic_rules(user)? {
                let rule = match rule {
                    Ok(rule) => rule,
                    Err(e) => {
                        warn!("Skipping automatic rule: {}", e);
                        continue;
                    }
                };
                let store = &self.store;
                let resolved = rules::apply_automatic(&rule, doc, |key_id, value| {
                    store
                        .get_or_create_metadata_value(key_id, value)
                        .map_err(|e| RuleError::Resolve(e.to_string()))
                });
                match resolved {
                    Ok(true) => filters_matched += 1,
                    Ok(false) => {}
                    Err(e) => warn!("Automatic rule '{}' failed: {}", rule.name, e),
                }
            }
        } else {
            debug!("No text for {}, skipping automatic filters", doc.mimetype);
        }

        let mut rules_matched = 0;
        for rule in self.store.active_rules(user)? {
            let rule = match rule {
                Ok(rule) => rule,
                Err(e) => {
                    warn!("Skipping rule: {}", e);
                    continue;
                }
            };
            if !rule.is_runnable() {
                continue;
            }
            match rules::apply_rule(&rule, doc) {
                Ok(true) => {
                    debug!("Rule '{}' matched", rule.name);
                    rules_matched += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Rule '{}' failed: {}", rule.name, e),
            }
        }

        self.store.update_document(doc)?;
        doc.metadata = self.store.document_metadata(doc.id)?;
        doc.tags = self.store.document_tags(doc.id)?;

        Ok(format!(
            "{} automatic filter(s) and {} rule(s) matched",
            filters_matched, rules_matched
        ))
    }

    fn step_index(&self, ctx: &mut PipelineContext) -> Result<String, PipelineError> {
        self.search
            .update_documents(ctx.document.user_id, std::slice::from_ref(&ctx.document))?;
        Ok("indexed".to_string())
    }
}
