//! Definition loader with a path-keyed cache
//!
//! Definitions are read once and served from the cache until the path is
//! invalidated, so a reload only sees new file contents after the registry
//! has dropped the old entry.

use cogs_api::{definition_hash, ModuleDefinition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur while loading a definition
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode JSON definition {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode MessagePack definition {path}: {source}")]
    MessagePack {
        path: PathBuf,
        #[source]
        source: rmp_serde::decode::Error,
    },

    #[error("Unsupported definition format: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("{0} does not declare a module definition")]
    NotADefinition(PathBuf),
}

/// Resolves a path to a module definition
pub trait DefinitionLoader: Send + Sync {
    /// Load the definition at `path`, possibly from cache
    fn load(&self, path: &Path) -> Result<Arc<ModuleDefinition>, LoaderError>;

    /// Drop any cached state for `path`, returning whether an entry existed
    fn invalidate(&self, path: &Path) -> bool;

    /// Whether `path` is currently served from cache
    fn is_cached(&self, path: &Path) -> bool;
}

struct CachedDefinition {
    definition: Arc<ModuleDefinition>,
    hash: String,
}

/// Loads `.json` and `.msgpack` definition files
#[derive(Default)]
pub struct ManifestLoader {
    cache: Mutex<HashMap<PathBuf, CachedDefinition>>,
    /// Last seen content hash per path, kept across invalidation
    hashes: Mutex<HashMap<PathBuf, String>>,
}

impl ManifestLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content hash of the cached definition at `path`
    pub fn cached_hash(&self, path: &Path) -> Option<String> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&cache_key(path)).map(|entry| entry.hash.clone())
    }

    fn read(path: &Path) -> Result<(ModuleDefinition, String), LoaderError> {
        let bytes = std::fs::read(path).map_err(|source| LoaderError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let value: serde_json::Value = match extension.as_deref() {
            Some("json") => {
                serde_json::from_slice(&bytes).map_err(|source| LoaderError::Json {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some("msgpack") | Some("mpk") => {
                rmp_serde::from_slice(&bytes).map_err(|source| LoaderError::MessagePack {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => return Err(LoaderError::UnsupportedExtension(path.to_path_buf())),
        };

        let definition = ModuleDefinition::find(value)
            .map_err(|source| LoaderError::Json {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| LoaderError::NotADefinition(path.to_path_buf()))?;

        Ok((definition, definition_hash(&bytes)))
    }
}

fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl DefinitionLoader for ManifestLoader {
    fn load(&self, path: &Path) -> Result<Arc<ModuleDefinition>, LoaderError> {
        let key = cache_key(path);

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(&key) {
                tracing::debug!(path = %path.display(), "Definition served from cache");
                return Ok(Arc::clone(&entry.definition));
            }
        }

        let (definition, hash) = Self::read(path)?;
        let definition = Arc::new(definition);

        let previous = {
            let mut hashes = self.hashes.lock().unwrap_or_else(PoisonError::into_inner);
            hashes.insert(key.clone(), hash.clone())
        };
        match previous {
            Some(old) if old == hash => {
                tracing::debug!(path = %path.display(), "Definition re-read, content unchanged")
            }
            Some(_) => tracing::debug!(path = %path.display(), "Definition re-read, content changed"),
            None => tracing::debug!(path = %path.display(), "Definition read"),
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(
            key,
            CachedDefinition {
                definition: Arc::clone(&definition),
                hash,
            },
        );
        Ok(definition)
    }

    fn invalidate(&self, path: &Path) -> bool {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.remove(&cache_key(path)).is_some()
    }

    fn is_cached(&self, path: &Path) -> bool {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.contains_key(&cache_key(path))
    }
}
