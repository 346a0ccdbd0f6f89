//! Helpers for sanitizing data before it is logged or persisted.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Turns extractor output into storable text: invalid UTF-8 sequences are
/// replaced, NUL and other control characters except whitespace are dropped.
pub fn sanitize_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/home/user/Documents/invoice.pdf")),
            "invoice.pdf"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_sanitize_text_replaces_invalid_bytes() {
        let raw = b"Invoice\x00 total \xff\xfe42\n\tEUR";
        assert_eq!(sanitize_text(raw), "Invoice total \u{fffd}\u{fffd}42\n\tEUR");
    }

    #[test]
    fn test_sanitize_text_keeps_unicode() {
        assert_eq!(sanitize_text("Grüße, 日本".as_bytes()), "Grüße, 日本");
    }
}
