use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::error::ProcessError;

/// Tesseract OCR through leptess. A fresh Tesseract handle is created per
/// image, so the engine can be shared between workers.
#[derive(Clone)]
pub struct OcrEngine {
    inner: Arc<OcrEngineInner>,
}

struct OcrEngineInner {
    languages: String,
    dpi: u32,
}

impl OcrEngine {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrEngineInner {
                languages: lang_str,
                dpi,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    pub fn dpi(&self) -> u32 {
        self.inner.dpi
    }

    /// Whether Tesseract initialises with the configured languages.
    pub fn probe(&self) -> bool {
        match leptess::LepTess::new(None, &self.inner.languages) {
            Ok(_) => true,
            Err(e) => {
                log::warn!(
                    "Tesseract unavailable for '{}': {}",
                    self.inner.languages,
                    e
                );
                false
            }
        }
    }

    pub fn process_image(&self, image_path: &Path) -> Result<String, ProcessError> {
        self.process_image_bytes(&std::fs::read(image_path).map_err(|e| {
            ProcessError::ReadDocument {
                path: image_path.to_path_buf(),
                source: e,
            }
        })?)
    }

    pub fn process_image_bytes(&self, image_data: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

        // leptess wants an encoded image; normalise everything to PNG.
        let mut png_data = Vec::new();
        let mut cursor = Cursor::new(&mut png_data);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}
