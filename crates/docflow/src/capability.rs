//! Supported file types, narrowed by which external tools were found at startup.

use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Which optional tools answered their startup probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolAvailability {
    pub ocr: bool,
    pub pandoc: bool,
    pub pdf_renderer: bool,
}

impl ToolAvailability {
    pub fn all() -> Self {
        Self {
            ocr: true,
            pandoc: true,
            pdf_renderer: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// How text is extracted from a mimetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Image,
    Convertible,
    Unsupported,
}

struct Entry {
    mimetype: &'static str,
    extensions: &'static [&'static str],
    display: &'static str,
}

const PDF: &[Entry] = &[Entry {
    mimetype: "application/pdf",
    extensions: &["pdf"],
    display: "PDF document",
}];

const IMAGES: &[Entry] = &[
    Entry {
        mimetype: "image/png",
        extensions: &["png"],
        display: "PNG image",
    },
    Entry {
        mimetype: "image/jpeg",
        extensions: &["jpg", "jpeg"],
        display: "JPEG image",
    },
    Entry {
        mimetype: "image/tiff",
        extensions: &["tif", "tiff"],
        display: "TIFF image",
    },
    Entry {
        mimetype: "image/gif",
        extensions: &["gif"],
        display: "GIF image",
    },
    Entry {
        mimetype: "image/bmp",
        extensions: &["bmp"],
        display: "Bitmap image",
    },
    Entry {
        mimetype: "image/webp",
        extensions: &["webp"],
        display: "WebP image",
    },
];

const CONVERTIBLE: &[Entry] = &[
    Entry {
        mimetype: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        extensions: &["docx"],
        display: "Word document",
    },
    Entry {
        mimetype: "application/vnd.oasis.opendocument.text",
        extensions: &["odt"],
        display: "OpenDocument text",
    },
    Entry {
        mimetype: "application/epub+zip",
        extensions: &["epub"],
        display: "EPUB e-book",
    },
    Entry {
        mimetype: "application/rtf",
        extensions: &["rtf"],
        display: "Rich Text Format",
    },
    Entry {
        mimetype: "text/html",
        extensions: &["html", "htm"],
        display: "HTML page",
    },
    Entry {
        mimetype: "text/markdown",
        extensions: &["md", "markdown"],
        display: "Markdown",
    },
    Entry {
        mimetype: "text/x-rst",
        extensions: &["rst"],
        display: "reStructuredText",
    },
    Entry {
        mimetype: "application/x-latex",
        extensions: &["tex", "latex"],
        display: "LaTeX document",
    },
    Entry {
        mimetype: "text/plain",
        extensions: &["txt", "text"],
        display: "Plain text",
    },
];

/// Immutable after construction; build it once at startup and share it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    mime_to_ext: HashMap<String, Vec<String>>,
    ext_to_mime: HashMap<String, String>,
    ext_to_name: HashMap<String, String>,
    convertible: HashSet<String>,
}

impl Registry {
    pub fn build(tools: ToolAvailability) -> Self {
        let mut registry = Self::default();

        registry.register(PDF, false);
        if tools.ocr {
            registry.register(IMAGES, false);
        }
        if tools.pandoc {
            registry.register(CONVERTIBLE, true);
        }

        registry
    }

    fn register(&mut self, entries: &[Entry], convertible: bool) {
        for entry in entries {
            self.mime_to_ext.insert(
                entry.mimetype.to_string(),
                entry.extensions.iter().map(|e| e.to_string()).collect(),
            );
            for ext in entry.extensions {
                self.ext_to_mime
                    .insert(ext.to_string(), entry.mimetype.to_string());
                self.ext_to_name
                    .insert(ext.to_string(), entry.display.to_string());
            }
            if convertible {
                self.convertible.insert(entry.mimetype.to_string());
            }
        }
    }

    /// With both arguments, the filename's extension must belong to the
    /// mimetype. With one, that one must be registered. With neither, false.
    pub fn is_supported(&self, mimetype: &str, filename: &str) -> bool {
        match (mimetype.is_empty(), filename.is_empty()) {
            (true, true) => false,
            (false, true) => self.mime_to_ext.contains_key(mimetype),
            (true, false) => extension_of(filename)
                .map(|ext| self.ext_to_mime.contains_key(&ext))
                .unwrap_or(false),
            (false, false) => {
                let Some(ext) = extension_of(filename) else {
                    return false;
                };
                self.mime_to_ext
                    .get(mimetype)
                    .map(|exts| exts.contains(&ext))
                    .unwrap_or(false)
            }
        }
    }

    pub fn is_convertible(&self, mimetype: &str) -> bool {
        self.convertible.contains(mimetype)
    }

    /// Whether the pipeline can extract text for this mimetype. Automatic
    /// filters are only run for these.
    pub fn has_text(&self, mimetype: &str) -> bool {
        self.mime_to_ext.contains_key(mimetype)
    }

    pub fn content_kind(&self, mimetype: &str) -> ContentKind {
        if mimetype == "application/pdf" {
            ContentKind::Pdf
        } else if mimetype.starts_with("image/") {
            ContentKind::Image
        } else if self.is_convertible(mimetype) {
            ContentKind::Convertible
        } else {
            ContentKind::Unsupported
        }
    }

    pub fn extensions(&self, mimetype: &str) -> Option<&[String]> {
        self.mime_to_ext.get(mimetype).map(|v| v.as_slice())
    }

    pub fn display_name(&self, extension: &str) -> Option<&str> {
        self.ext_to_name
            .get(&extension.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Registered mimetype for a path, from its extension.
    pub fn mimetype_for_path(&self, path: &Path) -> Option<String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;

        if let Some(mime) = self.ext_to_mime.get(&ext) {
            return Some(mime.clone());
        }

        mime_guess::from_path(path)
            .iter()
            .map(|m| m.essence_str().to_string())
            .find(|m| self.mime_to_ext.contains_key(m))
    }

    pub fn mimetypes(&self) -> impl Iterator<Item = &str> {
        self.mime_to_ext.keys().map(|s| s.as_str())
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_only_without_tools() {
        let registry = Registry::build(ToolAvailability::none());
        assert!(registry.is_supported("application/pdf", ""));
        assert!(!registry.is_supported("image/png", ""));
        assert!(!registry.is_supported("", "notes.md"));
        assert!(!registry.is_convertible("text/markdown"));
        assert_eq!(registry.mimetypes().count(), 1);
    }

    #[test]
    fn test_tools_widen_registry() {
        let registry = Registry::build(ToolAvailability::all());
        assert!(registry.is_supported("image/jpeg", "photo.JPEG"));
        assert!(registry.is_supported("", "report.docx"));
        assert!(registry.is_convertible("text/markdown"));
        assert!(!registry.is_convertible("application/pdf"));
        assert_eq!(registry.display_name("tif"), Some("TIFF image"));
    }

    #[test]
    fn test_is_supported_argument_combinations() {
        let registry = Registry::build(ToolAvailability::all());
        assert!(!registry.is_supported("", ""));
        assert!(registry.is_supported("application/pdf", "a.pdf"));
        assert!(!registry.is_supported("application/pdf", "a.png"));
        assert!(!registry.is_supported("application/pdf", "no_extension"));
        assert!(!registry.is_supported("application/zip", ""));
        assert!(!registry.is_supported("", "archive.zip"));
    }

    #[test]
    fn test_content_kind() {
        let registry = Registry::build(ToolAvailability::all());
        assert_eq!(registry.content_kind("application/pdf"), ContentKind::Pdf);
        assert_eq!(registry.content_kind("image/png"), ContentKind::Image);
        assert_eq!(registry.content_kind("text/html"), ContentKind::Convertible);
        assert_eq!(
            registry.content_kind("application/zip"),
            ContentKind::Unsupported
        );
    }

    #[test]
    fn test_mimetype_for_path() {
        let registry = Registry::build(ToolAvailability {
            ocr: true,
            pandoc: false,
            pdf_renderer: true,
        });
        assert_eq!(
            registry.mimetype_for_path(Path::new("/in/alice/Scan.JPG")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(registry.mimetype_for_path(Path::new("/in/alice/notes.md")), None);
        assert_eq!(registry.mimetype_for_path(Path::new("/in/alice/README")), None);
    }
}
