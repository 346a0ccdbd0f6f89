//! Text extraction and thumbnail rendering through external tools.

pub mod convert;
pub mod ocr;
pub mod pdf;
pub mod thumbnail;

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::capability::ToolAvailability;
use crate::config::Config;
use crate::error::ProcessError;

use self::ocr::OcrEngine;

/// Result of direct PDF text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfText {
    Text(String),
    /// No usable embedded text; the caller should fall back to OCR.
    Empty,
}

/// The external collaborators of the pipeline. Extracted text is returned as
/// raw bytes and sanitized by the caller.
///
/// `work_dir` is a per-document scratch directory that the caller removes.
pub trait ContentTools: Send + Sync {
    fn extract_pdf_text(&self, path: &Path) -> Result<PdfText, ProcessError>;

    fn ocr_image(&self, path: &Path) -> Result<Vec<u8>, ProcessError>;

    fn ocr_pdf(&self, path: &Path, work_dir: &Path) -> Result<Vec<u8>, ProcessError>;

    fn convert_to_text(&self, path: &Path, mimetype: &str) -> Result<Vec<u8>, ProcessError>;

    /// Renders a thumbnail into `out_dir` and returns its path.
    fn render_thumbnail(
        &self,
        path: &Path,
        mimetype: &str,
        out_dir: &Path,
        work_dir: &Path,
        size: (u32, u32),
    ) -> Result<PathBuf, ProcessError>;
}

/// lopdf, Tesseract, pdftoppm and pandoc.
pub struct SystemTools {
    ocr: OcrEngine,
    pdftoppm: String,
    pandoc: String,
    available: ToolAvailability,
}

/// Resolution used when rendering the first PDF page for a thumbnail.
const THUMBNAIL_DPI: u32 = 72;

impl SystemTools {
    /// Creates the tool set and probes every optional tool once.
    pub fn probe(config: &Config) -> Self {
        let mut tools = Self::unprobed(config);
        tools.available = ToolAvailability {
            ocr: config.ocr.enabled && tools.ocr.probe(),
            pandoc: convert::probe(&tools.pandoc),
            pdf_renderer: probe_pdftoppm(&tools.pdftoppm),
        };
        log::info!(
            "External tools: ocr={} ({}), pandoc={}, pdftoppm={}",
            tools.available.ocr,
            tools.ocr.languages(),
            tools.available.pandoc,
            tools.available.pdf_renderer
        );
        tools
    }

    /// A tool set that assumes nothing optional is installed.
    pub fn unprobed(config: &Config) -> Self {
        Self {
            ocr: OcrEngine::new(&config.ocr.languages, config.ocr.dpi),
            pdftoppm: config.tools.pdftoppm.clone(),
            pandoc: config.tools.pandoc.clone(),
            available: ToolAvailability::none(),
        }
    }

    pub fn availability(&self) -> ToolAvailability {
        self.available
    }

    fn require(&self, present: bool, tool: &'static str) -> Result<(), ProcessError> {
        if present {
            Ok(())
        } else {
            Err(ProcessError::ToolMissing(tool))
        }
    }
}

fn probe_pdftoppm(bin: &str) -> bool {
    // `pdftoppm -v` prints its version to stderr; some builds exit non-zero.
    Command::new(bin)
        .arg("-v")
        .output()
        .map(|o| o.status.success() || !o.stderr.is_empty())
        .unwrap_or(false)
}

impl ContentTools for SystemTools {
    fn extract_pdf_text(&self, path: &Path) -> Result<PdfText, ProcessError> {
        pdf::extract_text(path)
    }

    fn ocr_image(&self, path: &Path) -> Result<Vec<u8>, ProcessError> {
        self.require(self.available.ocr, "tesseract")?;
        Ok(self.ocr.process_image(path)?.into_bytes())
    }

    fn ocr_pdf(&self, path: &Path, work_dir: &Path) -> Result<Vec<u8>, ProcessError> {
        self.require(self.available.ocr, "tesseract")?;
        self.require(self.available.pdf_renderer, "pdftoppm")?;

        let _span = tracing::info_span!("processor.ocr_pdf").entered();
        let pages = pdf::render_pages(&self.pdftoppm, path, work_dir, self.ocr.dpi(), false)?;

        let mut text = String::new();
        for page in &pages {
            match self.ocr.process_image(page) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => log::warn!("OCR failed for page {}: {}", page.display(), e),
            }
        }
        Ok(text.into_bytes())
    }

    fn convert_to_text(&self, path: &Path, mimetype: &str) -> Result<Vec<u8>, ProcessError> {
        self.require(self.available.pandoc, "pandoc")?;
        convert::to_plain_text(&self.pandoc, path, mimetype)
    }

    fn render_thumbnail(
        &self,
        path: &Path,
        mimetype: &str,
        out_dir: &Path,
        work_dir: &Path,
        (width, height): (u32, u32),
    ) -> Result<PathBuf, ProcessError> {
        if mimetype == "application/pdf" {
            self.require(self.available.pdf_renderer, "pdftoppm")?;
            let pages = pdf::render_pages(&self.pdftoppm, path, work_dir, THUMBNAIL_DPI, true)?;
            let first = pages.first().ok_or_else(|| {
                ProcessError::Thumbnail("PDF has no renderable page".to_string())
            })?;
            thumbnail::render_image(first, out_dir, width, height)
        } else if mimetype.starts_with("image/") {
            thumbnail::render_image(path, out_dir, width, height)
        } else {
            Err(ProcessError::Thumbnail(format!(
                "No thumbnail renderer for {}",
                mimetype
            )))
        }
    }
}
