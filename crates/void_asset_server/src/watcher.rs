//! File system watcher for hot reload

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(feature = "file-watcher")]
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::error::{ServerError, ServerResult};

/// A file change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Watches package directories and reports debounced file changes
pub struct FileWatcher {
    #[cfg(feature = "file-watcher")]
    watcher: notify::RecommendedWatcher,
    #[cfg(feature = "file-watcher")]
    rx: crossbeam_channel::Receiver<notify::Result<Event>>,

    debounce: Debouncer,
    watch_dirs: Vec<PathBuf>,
}

/// Drops repeat events for a path inside the window
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    last: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    fn accept(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(last) = self.last.get(path) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        self.last.insert(path.to_path_buf(), now);
        true
    }

    fn prune(&mut self, now: Instant) {
        let keep = self.window.max(Duration::from_secs(5));
        self.last.retain(|_, time| now.duration_since(*time) < keep);
    }
}

impl FileWatcher {
    #[cfg(feature = "file-watcher")]
    pub fn new(debounce: Duration) -> ServerResult<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| ServerError::Watch(format!("Failed to create file watcher: {}", e)))?;

        Ok(Self {
            watcher,
            rx,
            debounce: Debouncer::new(debounce),
            watch_dirs: Vec::new(),
        })
    }

    /// Create a watcher that never reports changes
    #[cfg(not(feature = "file-watcher"))]
    pub fn new(debounce: Duration) -> ServerResult<Self> {
        Ok(Self {
            debounce: Debouncer::new(debounce),
            watch_dirs: Vec::new(),
        })
    }

    /// Watch a directory recursively
    #[cfg(feature = "file-watcher")]
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> ServerResult<()> {
        let path = dir.as_ref().to_path_buf();

        self.watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| ServerError::Watch(format!("Failed to watch {:?}: {}", path, e)))?;

        log::info!("Watching directory: {:?}", path);
        self.watch_dirs.push(path);
        Ok(())
    }

    #[cfg(not(feature = "file-watcher"))]
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> ServerResult<()> {
        self.watch_dirs.push(dir.as_ref().to_path_buf());
        Ok(())
    }

    /// Drain pending changes
    #[cfg(feature = "file-watcher")]
    pub fn poll(&mut self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        let now = Instant::now();

        while let Ok(result) = self.rx.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("File watcher error: {}", e);
                    continue;
                }
            };

            let kind = match event.kind {
                EventKind::Create(_) => FileChangeKind::Created,
                EventKind::Modify(_) => FileChangeKind::Modified,
                EventKind::Remove(_) => FileChangeKind::Deleted,
                _ => continue,
            };

            for path in event.paths {
                if path.is_dir() || !self.debounce.accept(&path, now) {
                    continue;
                }
                changes.push(FileChange { path, kind });
            }
        }

        self.debounce.prune(now);
        changes
    }

    #[cfg(not(feature = "file-watcher"))]
    pub fn poll(&mut self) -> Vec<FileChange> {
        Vec::new()
    }

    pub fn watch_dirs(&self) -> &[PathBuf] {
        &self.watch_dirs
    }

    pub fn set_debounce(&mut self, duration: Duration) {
        self.debounce.window = duration;
    }
}
