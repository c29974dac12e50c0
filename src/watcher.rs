use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches the live config file for external edits and invokes a callback
/// after writes have settled. Editors and atomic-rename writers emit bursts
/// of filesystem events, so the callback only fires once no new event has
/// arrived for the debounce window.
pub struct ConfigWatcher {
    // Dropped on stop; dropping unregisters the OS watch.
    _watcher: RecommendedWatcher,
    handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `config_path`. The parent directory is watched rather
    /// than the file itself so the watch survives rename-replace saves.
    pub fn spawn<F>(config_path: &Path, callback: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let parent = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = config_path
            .file_name()
            .context("config path has no file name")?
            .to_os_string();

        let (tx, mut rx) = mpsc::channel::<()>(16);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if ours {
                        let _ = tx.blocking_send(());
                    }
                }
                Err(e) => warn!("config watch error: {e}"),
            })
            .context("failed to create filesystem watcher")?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", parent.display()))?;

        let handle = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Absorb the burst: keep extending the window until quiet.
                loop {
                    match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                debug!("config file changed on disk");
                callback();
            }
        });

        Ok(Self {
            _watcher: watcher,
            handle,
        })
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
