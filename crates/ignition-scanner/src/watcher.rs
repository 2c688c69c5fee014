//! Debounced file system watcher for scanned projects.
//!
//! Bursts of events under a project tree collapse into a single callback
//! once the tree has been quiet for the debounce period.

use crate::error::{ScanError, ScanResult};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default quiet period before a change is reported
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Invoked with the watched project path after a debounced change
pub type ChangeCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Recursive watch on one project directory
pub struct ProjectWatcher {
    _watcher: RecommendedWatcher,
    debounce_handle: JoinHandle<()>,
    watched_path: PathBuf,
}

impl std::fmt::Debug for ProjectWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectWatcher")
            .field("watched_path", &self.watched_path)
            .finish_non_exhaustive()
    }
}

impl ProjectWatcher {
    /// Start watching `path`; must be called inside a tokio runtime
    ///
    /// # Errors
    /// Returns an error if the watch cannot be established
    pub fn new(path: &Path, debounce: Duration, on_change: ChangeCallback) -> ScanResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ScanError::Task(format!("watcher needs a tokio runtime: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let watched = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_change(&event.kind) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!("File watcher error under {}: {e}", watched.display()),
        })?;

        watcher.watch(path, RecursiveMode::Recursive)?;

        let debounce_handle = runtime.spawn(debounce_events(
            rx,
            debounce,
            path.to_path_buf(),
            on_change,
        ));

        debug!("Watching {} (debounce {:?})", path.display(), debounce);

        Ok(Self {
            _watcher: watcher,
            debounce_handle,
            watched_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.watched_path
    }
}

impl Drop for ProjectWatcher {
    fn drop(&mut self) {
        self.debounce_handle.abort();
    }
}

fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

async fn debounce_events(
    mut rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    path: PathBuf,
    on_change: ChangeCallback,
) {
    while rx.recv().await.is_some() {
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(())) => continue,
                // Watcher dropped mid-burst
                Ok(None) => return,
                Err(_) => break,
            }
        }
        debug!("Change detected under {}", path.display());
        on_change(&path);
    }
}
