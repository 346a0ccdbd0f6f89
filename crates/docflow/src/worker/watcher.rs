//! Input directory scanning and watching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{
    new_debouncer_opt, Config as DebouncerConfig, DebounceEventResult, DebouncedEventKind,
    Debouncer,
};
use walkdir::WalkDir;

use crate::error::WorkerError;

/// Watches the input tree and forwards written files. Watching stops when
/// this is dropped.
pub struct InputWatcher {
    _debouncer: Debouncer<PollWatcher>,
    events: Receiver<PathBuf>,
}

impl InputWatcher {
    /// Uses polling so network and container mounts behave the same as
    /// local disks.
    pub fn start(input_directory: &Path, poll_interval: Duration) -> Result<Self, WorkerError> {
        let poll_config = NotifyConfig::default().with_poll_interval(poll_interval);
        let debouncer_config = DebouncerConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_notify_config(poll_config);

        let (tx, events) = unbounded();
        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(
            debouncer_config,
            move |result: DebounceEventResult| match result {
                Ok(batch) => {
                    for event in batch {
                        if matches!(event.kind, DebouncedEventKind::Any) && is_candidate(&event.path)
                        {
                            if tx.send(event.path).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => warn!("Watch error: {:?}", e),
            },
        )
        .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(input_directory, RecursiveMode::Recursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching directory: {}", input_directory.display());
        Ok(Self {
            _debouncer: debouncer,
            events,
        })
    }

    pub fn events(&self) -> &Receiver<PathBuf> {
        &self.events
    }
}

/// Regular, visible files that still exist.
fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    !hidden && path.is_file()
}

/// Files already present in the input tree, in a stable order.
pub fn scan(input_directory: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(input_directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_candidate(path))
        .collect();
    files.sort();

    debug!(
        "Scanned {} files in {}",
        files.len(),
        input_directory.display()
    );
    files
}
