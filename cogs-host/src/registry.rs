//! Generic module registry
//!
//! Owns modules by id, keeps a category index consistent with the primary
//! map, discovers definitions from a directory and supports removal and
//! reload by id. Variant-specific bookkeeping (command aliases, listener
//! bindings) lives in the module type's [`RegistryIndex`].

use crate::discovery::{self, normalize_extension};
use crate::error::RegistryError;
use crate::events::{EventEmitter, EventHandler, EventPayload, EventSource, SubscriptionId};
use crate::loader::{DefinitionLoader, LoaderError, ManifestLoader};
use crate::module::{normalize, LoadSource, Module};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry shared with background tasks such as the hot reload watcher
pub type SharedRegistry<M> = Arc<RwLock<Registry<M>>>;

/// Configuration for a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory scanned by `load_all`
    pub directory: Option<PathBuf>,
    /// Accepted definition file extensions, normalized
    pub extensions: BTreeSet<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from("modules")),
            extensions: ["json", "msgpack"].iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl RegistryConfig {
    /// Defaults for a command registry (`./commands`)
    pub fn for_commands() -> Self {
        Self::default().directory("commands")
    }

    /// Defaults for a listener registry (`./listeners`)
    pub fn for_listeners() -> Self {
        Self::default().directory("listeners")
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Disable directory discovery
    pub fn without_directory(mut self) -> Self {
        self.directory = None;
        self
    }

    /// Replace the accepted extensions
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }
}

/// Variant-specific state kept in step with the registry's modules
///
/// `register_module` runs before the module is inserted and must leave the
/// index untouched when it fails; `deregister_module` runs before removal.
pub trait RegistryIndex<M>: Default + Send + Sync {
    fn register_module(&mut self, module: &Arc<M>) -> Result<(), RegistryError> {
        let _ = module;
        Ok(())
    }

    fn deregister_module(&mut self, module: &Arc<M>) -> Result<(), RegistryError> {
        let _ = module;
        Ok(())
    }
}

impl<M> RegistryIndex<M> for () {}

/// Owner and index of modules of one variant
pub struct Registry<M: Module> {
    config: RegistryConfig,
    modules: HashMap<String, Arc<M>>,
    categories: HashMap<String, HashMap<String, Arc<M>>>,
    handlers: HashMap<String, Arc<M::Exec>>,
    loader: Arc<dyn DefinitionLoader>,
    events: Arc<EventEmitter>,
    pub(crate) index: M::Index,
}

impl<M: Module> Registry<M> {
    /// Create an empty registry using the manifest loader
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_loader(config, Arc::new(ManifestLoader::new()))
    }

    /// Create with an existing loader
    pub fn with_loader(config: RegistryConfig, loader: Arc<dyn DefinitionLoader>) -> Self {
        Self {
            config,
            modules: HashMap::new(),
            categories: HashMap::new(),
            handlers: HashMap::new(),
            loader,
            events: EventEmitter::shared(),
            index: M::Index::default(),
        }
    }

    /// Wrap for sharing with background tasks
    pub fn into_shared(self) -> SharedRegistry<M> {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Event source this registry publishes on
    pub fn events(&self) -> Arc<EventEmitter> {
        Arc::clone(&self.events)
    }

    pub fn loader(&self) -> &Arc<dyn DefinitionLoader> {
        &self.loader
    }

    /// Register executable behavior under a handler name
    ///
    /// Definitions loaded afterwards whose handler name matches use it.
    pub fn define(&mut self, name: impl AsRef<str>, exec: Arc<M::Exec>) -> &mut Self {
        self.handlers.insert(normalize(name.as_ref()), exec);
        self
    }

    /// Load a definition file or register a module built in code
    ///
    /// Paths with an unaccepted extension, and definitions of another module
    /// kind, are skipped and yield `Ok(None)`.
    pub fn load(&mut self, source: impl Into<LoadSource<M>>) -> Result<Option<Arc<M>>, RegistryError> {
        match source.into() {
            LoadSource::Path(path) => self.load_path(&path, false),
            LoadSource::Instance(module) => self.load_instance(module).map(Some),
        }
    }

    /// Register a module built in code; it has no filepath and cannot be reloaded
    pub fn load_instance(&mut self, module: M) -> Result<Arc<M>, RegistryError> {
        let module = self.register(module, None)?;
        self.events.publish(&EventPayload::Load {
            module: module.info(),
            is_reload: false,
        });
        tracing::info!(kind = %M::KIND, id = %module.id(), "Module registered");
        Ok(module)
    }

    fn load_path(&mut self, path: &Path, is_reload: bool) -> Result<Option<Arc<M>>, RegistryError> {
        if !discovery::has_extension(path, &self.config.extensions) {
            tracing::debug!(path = %path.display(), "Skipping file with unaccepted extension");
            return Ok(None);
        }

        let definition = match self.loader.load(path) {
            Ok(definition) => definition,
            Err(LoaderError::NotADefinition(_)) => {
                self.loader.invalidate(path);
                tracing::debug!(path = %path.display(), "Skipping file without a definition");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if definition.kind() != M::KIND {
            self.loader.invalidate(path);
            tracing::debug!(
                path = %path.display(),
                found = %definition.kind(),
                expected = %M::KIND,
                "Skipping definition of another kind"
            );
            return Ok(None);
        }

        let exec = self
            .handlers
            .get(&normalize(definition.handler_name()))
            .cloned();
        if exec.is_none() {
            tracing::debug!(
                id = %definition.id(),
                handler = %definition.handler_name(),
                "No exec registered for definition"
            );
        }

        let module = match M::from_definition(&definition, exec)
            .and_then(|module| self.register(module, Some(path.to_path_buf())))
        {
            Ok(module) => module,
            Err(e) => {
                self.loader.invalidate(path);
                return Err(e);
            }
        };

        self.events.publish(&EventPayload::Load {
            module: module.info(),
            is_reload,
        });
        tracing::info!(
            kind = %M::KIND,
            id = %module.id(),
            path = %path.display(),
            is_reload,
            "Module loaded"
        );
        Ok(Some(module))
    }

    /// Load every accepted file below `directory`, or the configured directory
    ///
    /// Returns the number of modules loaded.
    pub fn load_all(&mut self, directory: Option<&Path>) -> Result<usize, RegistryError> {
        let directory = match directory {
            Some(dir) => dir.to_path_buf(),
            None => self
                .config
                .directory
                .clone()
                .ok_or(RegistryError::NoDirectorySpecified { kind: M::KIND })?,
        };

        let mut loaded = 0;
        for path in discovery::read_dir_recursive(&directory)? {
            if discovery::has_extension(&path, &self.config.extensions)
                && self.load_path(&path, false)?.is_some()
            {
                loaded += 1;
            }
        }

        tracing::debug!(kind = %M::KIND, dir = %directory.display(), loaded, "Directory loaded");
        Ok(loaded)
    }

    /// Remove a module by id
    pub fn remove(&mut self, id: &str) -> Result<Arc<M>, RegistryError> {
        let module = self.require(id)?;
        self.deregister(&module)?;

        self.events.publish(&EventPayload::Remove {
            module: module.info(),
        });
        tracing::info!(kind = %M::KIND, id = %module.id(), "Module removed");
        Ok(module)
    }

    /// Remove every module loaded from disk; modules registered in code stay
    pub fn remove_all(&mut self) -> Result<usize, RegistryError> {
        let ids = self.disk_backed_ids();
        for id in &ids {
            self.remove(id)?;
        }
        Ok(ids.len())
    }

    /// Deregister a disk-backed module and load its file again
    ///
    /// Returns `Ok(None)` when the file no longer holds a definition of this kind.
    pub fn reload(&mut self, id: &str) -> Result<Option<Arc<M>>, RegistryError> {
        let module = self.require(id)?;
        let Some(path) = module.filepath().map(Path::to_path_buf) else {
            return Err(RegistryError::NotReloadable {
                kind: M::KIND,
                id: id.to_string(),
            });
        };

        self.deregister(&module)?;
        self.load_path(&path, true)
    }

    /// Reload every module loaded from disk
    pub fn reload_all(&mut self) -> Result<usize, RegistryError> {
        let ids = self.disk_backed_ids();
        for id in &ids {
            self.reload(id)?;
        }
        Ok(ids.len())
    }

    /// Insert a module under its id and category
    ///
    /// Fails without changing any state when the id is taken or the index
    /// rejects the module.
    pub fn register(&mut self, mut module: M, filepath: Option<PathBuf>) -> Result<Arc<M>, RegistryError> {
        if self.modules.contains_key(module.id()) {
            return Err(RegistryError::DuplicateIdentifier {
                kind: M::KIND,
                id: module.id().to_string(),
            });
        }

        module.meta_mut().attach(M::KIND, filepath);
        let module = Arc::new(module);
        self.index.register_module(&module)?;

        let id = module.id().to_string();
        self.categories
            .entry(module.category().to_string())
            .or_default()
            .insert(id.clone(), Arc::clone(&module));
        self.modules.insert(id, Arc::clone(&module));
        Ok(module)
    }

    /// Remove a module from every index and drop its cached definition
    pub fn deregister(&mut self, module: &Arc<M>) -> Result<(), RegistryError> {
        self.index.deregister_module(module)?;

        if let Some(path) = module.filepath() {
            self.loader.invalidate(path);
        }

        self.modules.remove(module.id());
        if let Some(bucket) = self.categories.get_mut(module.category()) {
            bucket.remove(module.id());
            if bucket.is_empty() {
                self.categories.remove(module.category());
            }
        }
        Ok(())
    }

    /// Look up a module by id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&Arc<M>> {
        self.modules.get(&normalize(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Module loaded from `path`, if any
    pub fn find_by_path(&self, path: &Path) -> Option<&Arc<M>> {
        self.modules
            .values()
            .find(|m| m.filepath().map(|p| same_file(p, path)).unwrap_or(false))
    }

    pub fn modules(&self) -> &HashMap<String, Arc<M>> {
        &self.modules
    }

    /// Sorted module ids
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.modules.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn categories(&self) -> &HashMap<String, HashMap<String, Arc<M>>> {
        &self.categories
    }

    /// Modules in one category
    pub fn category(&self, name: &str) -> Option<&HashMap<String, Arc<M>>> {
        self.categories.get(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub(crate) fn require(&self, id: &str) -> Result<Arc<M>, RegistryError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| RegistryError::ModuleNotFound {
                kind: M::KIND,
                id: id.to_string(),
            })
    }

    fn disk_backed_ids(&self) -> Vec<String> {
        self.modules
            .values()
            .filter(|m| m.filepath().is_some())
            .map(|m| m.id().to_string())
            .collect()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl<M: Module> Default for Registry<M> {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl<M: Module> EventSource for Registry<M> {
    fn on(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        self.events.on(event, handler)
    }

    fn once(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        self.events.once(event, handler)
    }

    fn emit(&self, event: &str, payload: &EventPayload) -> usize {
        self.events.emit(event, payload)
    }

    fn off(&self, event: &str, subscription: SubscriptionId) -> bool {
        self.events.off(event, subscription)
    }

    fn is_subscribed(&self, event: &str, subscription: SubscriptionId) -> bool {
        self.events.is_subscribed(event, subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;
    use crate::module::BasicModule;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn record(registry: &Registry<BasicModule>, event: &str) -> Arc<Mutex<Vec<EventPayload>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        registry.on(
            event,
            Arc::new(move |payload: &EventPayload| inner.lock().unwrap().push(payload.clone())),
        );
        seen
    }

    fn write_module(dir: &Path, file: &str, id: &str) -> PathBuf {
        let path = dir.join(file);
        fs::write(&path, format!(r#"{{"kind":"module","id":"{}"}}"#, id)).unwrap();
        path
    }

    #[test]
    fn test_register_indexes_by_id_and_category() {
        let mut registry: Registry<BasicModule> = Registry::default();
        registry
            .load_instance(BasicModule::new("Core").with_category("Util"))
            .unwrap();
        registry.load_instance(BasicModule::new("extra")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("CORE"));
        assert_eq!(registry.category("util").unwrap().len(), 1);
        assert_eq!(registry.category("default").unwrap().len(), 1);
        assert_eq!(registry.ids(), vec!["core", "extra"]);
    }

    #[test]
    fn test_duplicate_identifier_leaves_state_unchanged() {
        let mut registry: Registry<BasicModule> = Registry::default();
        registry.load_instance(BasicModule::new("core")).unwrap();

        let result = registry.load_instance(BasicModule::new("CORE").with_category("other"));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateIdentifier { ref id, .. }) if id == "core"
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.category("other").is_none());
    }

    #[test]
    fn test_remove_cleans_category_bucket() {
        let mut registry: Registry<BasicModule> = Registry::default();
        let removed = record(&registry, names::REMOVE);
        registry
            .load_instance(BasicModule::new("core").with_category("util"))
            .unwrap();

        let module = registry.remove("core").unwrap();
        assert_eq!(module.id(), "core");
        assert!(registry.is_empty());
        assert!(registry.categories().is_empty());
        assert_eq!(removed.lock().unwrap().len(), 1);

        assert!(matches!(
            registry.remove("core"),
            Err(RegistryError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn test_load_all_requires_directory() {
        let mut registry: Registry<BasicModule> =
            Registry::new(RegistryConfig::default().without_directory());
        assert!(matches!(
            registry.load_all(None),
            Err(RegistryError::NoDirectorySpecified { .. })
        ));
    }

    #[test]
    fn test_load_all_discovers_and_skips() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        write_module(temp.path(), "core.json", "core");
        write_module(&temp.path().join("nested"), "extra.json", "extra");
        fs::write(temp.path().join("readme.txt"), "not a module").unwrap();
        fs::write(
            temp.path().join("build.json"),
            r#"{"kind":"command","id":"build"}"#,
        )
        .unwrap();

        let mut registry: Registry<BasicModule> =
            Registry::new(RegistryConfig::default().directory(temp.path()));
        let loads = record(&registry, names::LOAD);

        assert_eq!(registry.load_all(None).unwrap(), 2);
        assert_eq!(registry.ids(), vec!["core", "extra"]);
        assert_eq!(loads.lock().unwrap().len(), 2);
        // Definitions of another kind are not kept in the cache.
        assert!(!registry.loader().is_cached(&temp.path().join("build.json")));
    }

    #[test]
    fn test_load_all_skips_files_without_definition() {
        let temp = TempDir::new().unwrap();
        write_module(temp.path(), "core.json", "core");
        fs::write(temp.path().join("settings.json"), r#"{"theme":"dark"}"#).unwrap();
        fs::write(temp.path().join("list.json"), "[1, 2, 3]").unwrap();

        let mut registry: Registry<BasicModule> =
            Registry::new(RegistryConfig::default().directory(temp.path()));

        assert_eq!(registry.load_all(None).unwrap(), 1);
        assert_eq!(registry.ids(), vec!["core"]);
        assert!(registry
            .load(temp.path().join("settings.json").as_path())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_all_fails_on_malformed_definition() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.json"), r#"{"kind":"module"}"#).unwrap();

        let mut registry: Registry<BasicModule> =
            Registry::new(RegistryConfig::default().directory(temp.path()));
        assert!(matches!(
            registry.load_all(None),
            Err(RegistryError::Loader(LoaderError::Json { .. }))
        ));
    }

    #[test]
    fn test_load_skips_unaccepted_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("core.yaml");
        fs::write(&path, "kind: module").unwrap();

        let mut registry: Registry<BasicModule> = Registry::default();
        assert!(registry.load(path.as_path()).unwrap().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reload_rereads_file_and_keeps_id() {
        let temp = TempDir::new().unwrap();
        let path = write_module(temp.path(), "core.json", "core");

        let mut registry: Registry<BasicModule> = Registry::default();
        let loads = record(&registry, names::LOAD);
        registry.load(path.as_path()).unwrap();

        fs::write(&path, r#"{"kind":"module","id":"core","category":"util"}"#).unwrap();
        let reloaded = registry.reload("core").unwrap().unwrap();

        assert_eq!(reloaded.id(), "core");
        assert_eq!(reloaded.category(), "util");
        assert!(registry.category("default").is_none());

        let loads = loads.lock().unwrap();
        assert!(matches!(loads[0], EventPayload::Load { is_reload: false, .. }));
        assert!(matches!(loads[1], EventPayload::Load { is_reload: true, .. }));
    }

    #[test]
    fn test_reload_requires_filepath() {
        let mut registry: Registry<BasicModule> = Registry::default();
        registry.load_instance(BasicModule::new("core")).unwrap();

        assert!(matches!(
            registry.reload("core"),
            Err(RegistryError::NotReloadable { .. })
        ));
        assert!(matches!(
            registry.reload("missing"),
            Err(RegistryError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_all_keeps_code_registered_modules() {
        let temp = TempDir::new().unwrap();
        write_module(temp.path(), "a.json", "a");
        write_module(temp.path(), "b.json", "b");

        let mut registry: Registry<BasicModule> =
            Registry::new(RegistryConfig::default().directory(temp.path()));
        registry.load_all(None).unwrap();
        registry.load_instance(BasicModule::new("inline")).unwrap();

        assert_eq!(registry.remove_all().unwrap(), 2);
        assert_eq!(registry.ids(), vec!["inline"]);
    }

    #[test]
    fn test_reload_all_and_find_by_path() {
        let temp = TempDir::new().unwrap();
        let a = write_module(temp.path(), "a.json", "a");
        write_module(temp.path(), "b.json", "b");

        let mut registry: Registry<BasicModule> =
            Registry::new(RegistryConfig::default().directory(temp.path()));
        registry.load_all(None).unwrap();
        registry.load_instance(BasicModule::new("inline")).unwrap();

        assert_eq!(registry.reload_all().unwrap(), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find_by_path(&a).unwrap().id(), "a");
    }
}
