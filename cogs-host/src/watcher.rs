//! Hot reload file watcher for module definitions
//!
//! Watches a registry's directory for changes and automatically
//! loads, reloads, or removes modules.

use crate::discovery;
use crate::error::RegistryError;
use crate::module::Module;
use crate::registry::SharedRegistry;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Configuration for the hot reload watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for file events
    pub debounce: Duration,
    /// Whether to load existing definitions on start
    pub load_existing: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            load_existing: true,
        }
    }
}

/// Hot reload watcher for a registry's directory
pub struct HotReloadWatcher<M: Module> {
    registry: SharedRegistry<M>,
    directory: PathBuf,
    _watcher: RecommendedWatcher,
    shutdown_tx: mpsc::Sender<()>,
}

impl<M: Module> HotReloadWatcher<M> {
    /// Start watching the registry's configured directory
    pub async fn new(registry: SharedRegistry<M>, config: WatcherConfig) -> Result<Self, WatcherError> {
        let (directory, extensions) = {
            let registry = registry.read().await;
            let directory = registry
                .config()
                .directory
                .clone()
                .ok_or(RegistryError::NoDirectorySpecified { kind: M::KIND })?;
            (directory, registry.config().extensions.clone())
        };
        // Canonical so stored filepaths match the paths notify reports.
        let directory = std::fs::canonicalize(&directory).unwrap_or(directory);

        if config.load_existing && directory.is_dir() {
            let loaded = registry.write().await.load_all(Some(&directory))?;
            tracing::info!(kind = %M::KIND, dir = %directory.display(), loaded, "Loaded existing modules");
        }

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(100);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = event_tx.blocking_send(event);
            }
        })
        .map_err(WatcherError::WatcherInit)?;

        if directory.exists() {
            watcher
                .watch(&directory, RecursiveMode::Recursive)
                .map_err(WatcherError::WatcherInit)?;
            tracing::info!(kind = %M::KIND, dir = %directory.display(), "Watching directory for modules");
        } else {
            tracing::warn!(dir = %directory.display(), "Directory does not exist, skipping");
        }

        let registry_clone = registry.clone();
        let debounce = config.debounce;
        tokio::spawn(async move {
            let mut pending: Vec<PathBuf> = Vec::new();
            let mut debounce_timer: Option<tokio::time::Instant> = None;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!(kind = %M::KIND, "Hot reload watcher shutting down");
                        break;
                    }

                    Some(event) = event_rx.recv() => {
                        for path in event.paths {
                            if is_candidate(&path, &extensions) {
                                if !pending.contains(&path) {
                                    pending.push(path);
                                }
                                debounce_timer = Some(tokio::time::Instant::now() + debounce);
                            }
                        }
                    }

                    _ = async {
                        if let Some(deadline) = debounce_timer {
                            tokio::time::sleep_until(deadline).await;
                        } else {
                            std::future::pending::<()>().await;
                        }
                    } => {
                        for path in pending.drain(..) {
                            handle_file_change(&registry_clone, &path).await;
                        }
                        debounce_timer = None;
                    }
                }
            }
        });

        Ok(Self {
            registry,
            directory,
            _watcher: watcher,
            shutdown_tx,
        })
    }

    /// Get a reference to the watched registry
    pub fn registry(&self) -> &SharedRegistry<M> {
        &self.registry
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Shutdown the watcher
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

fn is_candidate(path: &Path, extensions: &BTreeSet<String>) -> bool {
    !path.is_dir() && discovery::has_extension(path, extensions)
}

/// Reload, load or remove the module backed by `path`
async fn handle_file_change<M: Module>(registry: &SharedRegistry<M>, path: &Path) {
    let mut registry = registry.write().await;
    let existing = registry.find_by_path(path).map(|m| m.id().to_string());

    if path.exists() {
        let result = match &existing {
            Some(id) => registry.reload(id),
            None => registry.load(path),
        };
        match result {
            Ok(Some(module)) => {
                tracing::info!(id = %module.id(), path = %path.display(), "Module reloaded from disk");
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "Changed file holds no module of this kind");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to reload module");
            }
        }
    } else if let Some(id) = existing {
        match registry.remove(&id) {
            Ok(_) => tracing::info!(id = %id, path = %path.display(), "Module removed (file deleted)"),
            Err(e) => tracing::warn!(id = %id, error = %e, "Failed to remove module"),
        }
    }
}

/// Errors that can occur during watching
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Failed to initialize watcher: {0}")]
    WatcherInit(#[source] notify::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
