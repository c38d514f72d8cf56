//! Asset source over package directories on disk

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use void_resource::{AssetChange, AssetError, AssetReply, AssetRequest, AssetSource, LoadedAsset, WatchId};

use crate::config::AssetServerConfig;
use crate::error::ServerResult;
use crate::loaders::LoaderOptions;
use crate::package::PackageSet;
use crate::watcher::{FileChangeKind, FileWatcher};
use crate::worker::IoWorker;

#[derive(Default)]
struct WatchTable {
    by_path: HashMap<PathBuf, Vec<(WatchId, AssetRequest)>>,
    next: u64,
}

impl WatchTable {
    fn insert(&mut self, path: PathBuf, request: &AssetRequest) -> WatchId {
        let entries = self.by_path.entry(path).or_default();
        if let Some((watch, _)) = entries
            .iter()
            .find(|(_, r)| r.package == request.package && r.name == request.name)
        {
            return *watch;
        }
        self.next += 1;
        let watch = WatchId(self.next);
        entries.push((watch, request.clone()));
        watch
    }

    fn len(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }
}

/// Serves assets from package directories
///
/// Synchronous loads read on the calling thread. Asynchronous requests go to a
/// single IO worker and complete in submission order. With hot reload on,
/// package roots are watched and changed files are decoded again for every
/// watch on them.
pub struct FileAssetSource {
    packages: Arc<PackageSet>,
    worker: IoWorker,
    watcher: Mutex<Option<FileWatcher>>,
    watches: Mutex<WatchTable>,
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

impl FileAssetSource {
    /// Open every configured package and start the IO worker
    pub fn new(config: AssetServerConfig) -> ServerResult<Self> {
        let options = LoaderOptions {
            generate_mips: config.generate_mips,
        };
        let packages = Arc::new(PackageSet::open(&config.packages, options)?);

        let watcher = if config.hot_reload {
            let mut watcher = FileWatcher::new(Duration::from_millis(config.debounce_ms))?;
            for package in packages.iter() {
                watcher.watch(package.root())?;
            }
            Some(watcher)
        } else {
            None
        };

        let worker = IoWorker::spawn(Arc::clone(&packages))?;
        log::info!(
            "Asset source ready: {} packages, hot reload {}",
            config.packages.len(),
            if watcher.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            packages,
            worker,
            watcher: Mutex::new(watcher),
            watches: Mutex::new(WatchTable::default()),
        })
    }

    pub fn packages(&self) -> &PackageSet {
        &self.packages
    }

    /// Number of watched assets
    pub fn watch_count(&self) -> usize {
        self.watches.lock().len()
    }

    /// Decode a changed file again for every watch on it
    fn change_for(&self, path: &Path) -> Vec<AssetChange> {
        let entries = match self.watches.lock().by_path.get(&normalize(path)) {
            Some(entries) => entries.clone(),
            None => return Vec::new(),
        };

        let mut changes = Vec::with_capacity(entries.len());
        for (watch, request) in entries {
            match self.packages.read(&request) {
                Ok(asset) => changes.push(AssetChange { watch, asset }),
                Err(e) => log::warn!("Hot reload of {} skipped: {}", request.name, e),
            }
        }
        changes
    }
}

impl AssetSource for FileAssetSource {
    fn request(&self, _request: AssetRequest, reply: AssetReply) -> bool {
        self.worker.submit(reply)
    }

    fn load(&self, request: &AssetRequest) -> Result<LoadedAsset, AssetError> {
        self.packages.read(request)
    }

    fn watch(&self, request: &AssetRequest) -> Option<WatchId> {
        if self.watcher.lock().is_none() {
            return None;
        }
        let path = match self.packages.resolve(request) {
            Ok(path) => normalize(&path),
            Err(e) => {
                log::debug!("Not watching {}: {}", request.name, e);
                return None;
            }
        };
        Some(self.watches.lock().insert(path, request))
    }

    fn poll_changes(&self) -> Vec<AssetChange> {
        let files = match self.watcher.lock().as_mut() {
            Some(watcher) => watcher.poll(),
            None => return Vec::new(),
        };

        let mut changes = Vec::new();
        for file in files {
            if file.kind == FileChangeKind::Deleted {
                log::debug!("Watched file removed: {:?}", file.path);
                continue;
            }
            changes.extend(self.change_for(&file.path));
        }
        changes
    }
}
