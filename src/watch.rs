//! File watching for continuous incremental scans.
//!
//! Turns debounced file-system events into the scanner's change-set shape,
//! and surfaces settings-file edits separately so the driver can reload the
//! option store (which invalidates the engine through its subscription).

use crate::scanner::{is_source_file, ChangeKind, FileChange};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

/// One debounced batch of workspace activity.
#[derive(Debug, Default)]
pub struct WatchBatch {
    /// Source-file changes, deduplicated, in event order.
    pub changes: Vec<FileChange>,
    /// Whether the settings file itself was touched.
    pub settings_changed: bool,
}

impl WatchBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.settings_changed
    }
}

/// Debounced recursive watcher over the workspace roots.
pub struct WorkspaceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    receiver: Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    roots: Vec<PathBuf>,
    settings: Option<PathBuf>,
}

impl WorkspaceWatcher {
    /// Watch `roots` recursively, plus the directory holding `settings` (many
    /// editors replace the file on save, which drops a direct file watch).
    pub fn new(roots: &[PathBuf], settings: Option<&Path>) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(300), tx)?;

        for root in roots {
            let watch_path = if root.is_file() {
                root.parent().unwrap_or(Path::new("."))
            } else {
                root.as_path()
            };
            debouncer
                .watcher()
                .watch(watch_path, RecursiveMode::Recursive)?;
        }

        if let Some(settings) = settings {
            let dir = settings.parent().unwrap_or(Path::new("."));
            debouncer.watcher().watch(dir, RecursiveMode::NonRecursive)?;
        }

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            roots: roots.to_vec(),
            settings: settings.map(Path::to_path_buf),
        })
    }

    /// Block until the next non-empty batch; `None` once the channel closes.
    pub fn wait(&self) -> Option<WatchBatch> {
        loop {
            match self.receiver.recv() {
                Ok(Ok(events)) => {
                    let batch = self.collect(events);
                    if !batch.is_empty() {
                        return Some(batch);
                    }
                }
                Ok(Err(_)) | Err(_) => return None,
            }
        }
    }

    fn collect(&self, events: Vec<DebouncedEvent>) -> WatchBatch {
        let mut batch = WatchBatch::default();
        for event in events {
            let path = event.path;
            if self.is_settings_file(&path) {
                batch.settings_changed = true;
                continue;
            }
            if !is_source_file(&path) || !self.matches_root(&path) {
                continue;
            }
            if batch.changes.iter().any(|c| c.path == path) {
                continue;
            }
            let kind = classify(&path);
            batch.changes.push(FileChange::new(path, kind));
        }
        batch
    }

    fn is_settings_file(&self, path: &Path) -> bool {
        self.settings.as_deref() == Some(path)
    }

    fn matches_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| {
            if root.is_file() {
                path == root
            } else {
                path.starts_with(root)
            }
        })
    }
}

/// The debounced event stream carries no change kind; derive it from the
/// file's current existence.
fn classify(path: &Path) -> ChangeKind {
    if path.exists() {
        ChangeKind::Changed
    } else {
        ChangeKind::Removed
    }
}
