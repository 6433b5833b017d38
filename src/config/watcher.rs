//! Log level hot reload.
//!
//! The directory holding the config file is watched, not the file itself:
//! editors that save by writing a temporary file and renaming it over the
//! original replace the inode, which a watch on the file would lose.
//! Bursts of events are coalesced before the file is re-read, and only a
//! changed log level is published. Listeners and routes stay as bound.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use crate::config::loader::load_config;

/// Quiet period after the last file event before the file is re-read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches one config file and publishes its log level.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
}

/// Stream of reloaded log levels. Dropping it stops the watch.
pub struct LevelUpdates {
    levels: watch::Receiver<String>,
    _watcher: RecommendedWatcher,
}

impl LevelUpdates {
    /// Wait for the next level that differs from the last one published.
    ///
    /// Returns `None` once the reload task has stopped.
    pub async fn changed(&mut self) -> Option<String> {
        self.levels.changed().await.ok()?;
        Some(self.levels.borrow_and_update().clone())
    }

    /// Level currently in effect.
    pub fn current(&self) -> String {
        self.levels.borrow().clone()
    }
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. `initial_level` is the level already applied.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, initial_level: impl Into<String>) -> Result<LevelUpdates, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| notify::Error::path_not_found().add_path(self.path.clone()))?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &file_name) => {
                let _ = tick_tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Config watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let (level_tx, levels) = watch::channel(initial_level.into());
        tokio::spawn(reload_levels(self.path.clone(), self.debounce, tick_rx, level_tx));

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(LevelUpdates {
            levels,
            _watcher: watcher,
        })
    }
}

/// Whether `event` concerns the watched file rather than a sibling.
fn touches(event: &Event, file_name: &OsString) -> bool {
    !event.kind.is_access()
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

async fn reload_levels(
    path: PathBuf,
    debounce: Duration,
    mut ticks: mpsc::UnboundedReceiver<()>,
    levels: watch::Sender<String>,
) {
    while ticks.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while ticks.try_recv().is_ok() {}

        let level = match load_config(&path) {
            Ok(config) => config.observability.log_level,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config reload failed, keeping current level");
                continue;
            }
        };

        let changed = levels.send_if_modified(|current| {
            if *current == level {
                return false;
            }
            *current = level.clone();
            true
        });
        if changed {
            tracing::info!(level = %level, "Config reloaded");
        }
        if levels.is_closed() {
            break;
        }
    }
    tracing::debug!(path = %path.display(), "Config watcher stopped");
}
