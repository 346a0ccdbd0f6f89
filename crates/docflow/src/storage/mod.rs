//! On-disk layout of the data directory.
//!
//! ```text
//! <data>/documents/<sha256>.<ext>
//! <data>/thumbnails/<document-id>/
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::model::{Document, DocumentId};

#[derive(Debug, Clone)]
pub struct FileLayout {
    data_directory: PathBuf,
}

impl FileLayout {
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.as_ref().to_path_buf(),
        }
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_directory.join("documents")
    }

    pub fn thumbnails_root(&self) -> PathBuf {
        self.data_directory.join("thumbnails")
    }

    /// Content-addressed path for a file with the given hash and extension.
    pub fn content_path(&self, hash: &str, extension: Option<&str>) -> PathBuf {
        let name = match extension {
            Some(ext) if !ext.is_empty() => format!("{}.{}", hash, ext),
            _ => hash.to_string(),
        };
        self.documents_dir().join(name)
    }

    pub fn document_path(&self, doc: &Document) -> PathBuf {
        self.content_path(&doc.hash, doc.extension().as_deref())
    }

    pub fn thumbnail_dir(&self, id: DocumentId) -> PathBuf {
        self.thumbnails_root().join(id.to_string())
    }

    pub fn ensure_directories(&self) -> Result<(), StorageError> {
        ensure_directory(&self.documents_dir())?;
        ensure_directory(&self.thumbnails_root())
    }
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Hex encoded SHA-256 of the file contents.
pub fn hash_file(path: &Path) -> Result<String, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    hash_reader(BufReader::new(file)).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Moves `src` to `dst`, creating the parent directory. Falls back to
/// copy + remove when `rename` fails (cross-device moves).
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if let Some(parent) = dst.parent() {
        ensure_directory(parent)?;
    }

    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = FileLayout::new("/data");
        assert_eq!(
            layout.content_path("abc", Some("pdf")),
            PathBuf::from("/data/documents/abc.pdf")
        );
        assert_eq!(
            layout.content_path("abc", None),
            PathBuf::from("/data/documents/abc")
        );
        assert_eq!(layout.thumbnail_dir(42), PathBuf::from("/data/thumbnails/42"));

        let doc = Document::new(1, "Scan.PNG", "image/png", 1, "ff00");
        assert_eq!(
            layout.document_path(&doc),
            PathBuf::from("/data/documents/ff00.png")
        );
    }

    #[test]
    fn test_hash_file_is_sha256_hex() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_missing_file() {
        let result = hash_file(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(StorageError::ReadFile { .. })));
    }

    #[test]
    fn test_move_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.pdf");
        let dst = dir.path().join("nested/out.pdf");
        std::fs::write(&src, b"pdf").unwrap();

        move_file(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"pdf");
    }
}
