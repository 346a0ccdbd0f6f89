use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ProcessError;
use crate::processor::PdfText;

/// Direct text extraction with lopdf.
///
/// Files lopdf cannot parse, and text that looks like a scan or a broken
/// font encoding, come back as [`PdfText::Empty`] so the caller falls back
/// to OCR.
pub fn extract_text(path: &Path) -> Result<PdfText, ProcessError> {
    let _span = tracing::info_span!("processor.pdf").entered();

    let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let doc = match lopdf::Document::load_mem(&pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("lopdf failed to parse PDF: {}. Falling back to OCR.", e);
            return Ok(PdfText::Empty);
        }
    };

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    if should_use_ocr(&text) {
        Ok(PdfText::Empty)
    } else {
        Ok(PdfText::Text(text))
    }
}

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is considered valid regardless of character composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Below this share of alphanumeric characters the text is treated as garbled.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

fn should_use_ocr(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");

    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Renders pages of a PDF to PNG files inside `work_dir` with pdftoppm and
/// returns them in page order. `only_first` limits rendering to page one.
pub fn render_pages(
    pdftoppm: &str,
    pdf: &Path,
    work_dir: &Path,
    dpi: u32,
    only_first: bool,
) -> Result<Vec<PathBuf>, ProcessError> {
    let prefix = work_dir.join("page");

    let mut cmd = Command::new(pdftoppm);
    cmd.arg("-png").arg("-r").arg(dpi.to_string());
    if only_first {
        cmd.args(["-f", "1", "-l", "1"]);
    }
    cmd.arg(pdf).arg(&prefix);

    let output = cmd.output().map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Failed to run {}: {}. Make sure poppler-utils is installed.",
            pdftoppm, e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let mut pages = rendered_pages(work_dir)?;
    if pages.is_empty() {
        return Err(ProcessError::PdfProcessing(
            "pdftoppm produced no page images".to_string(),
        ));
    }
    pages.sort_by_key(|(num, _)| *num);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// Collects `page-<n>.png` files; pdftoppm zero-pads `<n>` depending on the
/// page count.
fn rendered_pages(work_dir: &Path) -> Result<Vec<(u32, PathBuf)>, ProcessError> {
    let entries = std::fs::read_dir(work_dir).map_err(|e| ProcessError::ReadDocument {
        path: work_dir.to_path_buf(),
        source: e,
    })?;

    let mut pages = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let number = name
            .strip_prefix("page-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(number) = number {
            pages.push((number, path));
        }
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn pdf_with_text(content: &str) -> Vec<u8> {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            }),
        );
        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            }),
        );

        let stream = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", content);
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, stream.into_bytes())),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extract_embedded_text() {
        let mut file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::io::Write::write_all(&mut file, &pdf_with_text("Quarterly Invoice ACME")).unwrap();

        match extract_text(file.path()).unwrap() {
            PdfText::Text(text) => assert!(text.contains("Quarterly Invoice ACME")),
            PdfText::Empty => panic!("expected embedded text"),
        }
    }

    #[test]
    fn test_blank_pdf_signals_empty() {
        let mut file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::io::Write::write_all(&mut file, &pdf_with_text("")).unwrap();

        assert_eq!(extract_text(file.path()).unwrap(), PdfText::Empty);
    }

    #[test]
    fn test_unparseable_pdf_signals_empty() {
        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), b"not a valid pdf content").unwrap();

        assert_eq!(extract_text(file.path()).unwrap(), PdfText::Empty);
    }

    #[test]
    fn test_missing_pdf_is_an_error() {
        let result = extract_text(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(ProcessError::ReadDocument { .. })));
    }

    #[test]
    fn test_should_use_ocr_heuristics() {
        assert!(should_use_ocr("   \n "));
        assert!(should_use_ocr("?Identity-H Unimplemented?\n?Identity-H Unimplemented?"));
        assert!(should_use_ocr(&"~".repeat(60)));
        assert!(!should_use_ocr("Invoice 2024"));
        assert!(!should_use_ocr("!!"));
    }

    #[test]
    fn test_rendered_pages_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-02.png", "page-10.png", "page-01.png", "other.png"] {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }

        let mut pages = rendered_pages(dir.path()).unwrap();
        pages.sort_by_key(|(n, _)| *n);
        let numbers: Vec<u32> = pages.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }
}
