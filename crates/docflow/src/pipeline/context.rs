use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::error::PipelineError;
use crate::model::Document;

/// Per-document state carried through the steps of one run.
///
/// The open file handle and the scratch directory are released when the
/// context is dropped.
pub struct PipelineContext {
    pub document: Document,
    path: PathBuf,
    file: File,
    work_dir: Option<TempDir>,
}

impl PipelineContext {
    pub fn open(document: Document, path: PathBuf) -> Result<Self, PipelineError> {
        let file = open_file(&path)?;
        Ok(Self {
            document,
            path,
            file,
            work_dir: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open handle, rewound to the start.
    pub fn file(&mut self) -> Result<&mut File, PipelineError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| PipelineError::FileUnavailable {
                path: self.path.clone(),
                source: e,
            })?;
        Ok(&mut self.file)
    }

    /// Swaps the handle for one on `path`, after the file was moved.
    pub fn reopen(&mut self, path: PathBuf) -> Result<(), PipelineError> {
        self.file = open_file(&path)?;
        self.path = path;
        Ok(())
    }

    /// Scratch directory for external tools, created on first use.
    pub fn work_dir(&mut self) -> Result<&Path, PipelineError> {
        let dir = match self.work_dir.take() {
            Some(dir) => dir,
            None => tempfile::Builder::new()
                .prefix("docflow-")
                .tempdir()
                .map_err(|e| PipelineError::FileUnavailable {
                    path: std::env::temp_dir(),
                    source: e,
                })?,
        };
        Ok(self.work_dir.insert(dir).path())
    }

    /// A named subdirectory of the scratch directory, so tools that write
    /// similarly named files do not see each other's output.
    pub fn scratch(&mut self, name: &str) -> Result<PathBuf, PipelineError> {
        let dir = self.work_dir()?.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::FileUnavailable {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }
}

impl Drop for PipelineContext {
    fn drop(&mut self) {
        if let Some(dir) = self.work_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove work dir {}: {}", path.display(), e);
            }
        }
    }
}

fn open_file(path: &Path) -> Result<File, PipelineError> {
    File::open(path).map_err(|e| PipelineError::FileUnavailable {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn doc() -> Document {
        Document::new(1, "note.txt", "text/plain", 5, "h")
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let result = PipelineContext::open(doc(), PathBuf::from("/nonexistent/file"));
        assert!(matches!(result, Err(PipelineError::FileUnavailable { .. })));
    }

    #[test]
    fn test_work_dir_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut ctx = PipelineContext::open(doc(), path).unwrap();
        let work = ctx.work_dir().unwrap().to_path_buf();
        assert_eq!(ctx.work_dir().unwrap(), work.as_path());
        assert!(work.is_dir());
        assert!(ctx.scratch("ocr").unwrap().is_dir());

        drop(ctx);
        assert!(!work.exists());
    }

    #[test]
    fn test_file_is_rewound_and_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();

        let mut ctx = PipelineContext::open(doc(), first).unwrap();
        let mut buf = String::new();
        ctx.file().unwrap().read_to_string(&mut buf).unwrap();
        buf.clear();
        ctx.file().unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "first");

        ctx.reopen(second.clone()).unwrap();
        buf.clear();
        ctx.file().unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "second");
        assert_eq!(ctx.path(), second.as_path());
    }
}
