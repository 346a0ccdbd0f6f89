use std::path::Path;
use std::process::Command;

use crate::error::ProcessError;

/// pandoc reader name for a mimetype. `None` means the file is read as is.
fn pandoc_format(mimetype: &str) -> Option<&'static str> {
    match mimetype {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/vnd.oasis.opendocument.text" => Some("odt"),
        "application/epub+zip" => Some("epub"),
        "application/rtf" => Some("rtf"),
        "text/html" => Some("html"),
        "text/markdown" => Some("markdown"),
        "text/x-rst" => Some("rst"),
        "application/x-latex" => Some("latex"),
        _ => None,
    }
}

/// Converts a document to plain text with pandoc.
pub fn to_plain_text(pandoc: &str, path: &Path, mimetype: &str) -> Result<Vec<u8>, ProcessError> {
    let _span = tracing::info_span!("processor.convert", mimetype).entered();

    let Some(format) = pandoc_format(mimetype) else {
        return std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        });
    };

    let output = Command::new(pandoc)
        .args(["--from", format, "--to", "plain", "--wrap=none"])
        .arg(path)
        .output()
        .map_err(|e| ProcessError::Conversion(format!("Failed to run {}: {}", pandoc, e)))?;

    if !output.status.success() {
        return Err(ProcessError::Conversion(format!(
            "pandoc exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(output.stdout)
}

/// `pandoc --version` exits successfully.
pub fn probe(pandoc: &str) -> bool {
    Command::new(pandoc)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
