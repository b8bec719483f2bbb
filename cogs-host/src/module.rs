//! Module identity
//!
//! Every module carries a [`ModuleMeta`]: a normalized id, a category and,
//! for modules discovered on disk, the file they were loaded from.

use crate::error::RegistryError;
use crate::registry::RegistryIndex;
use cogs_api::{ModuleDefinition, ModuleKind, DEFAULT_CATEGORY};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity shared by all module variants
#[derive(Debug, Clone)]
pub struct ModuleMeta {
    id: String,
    category: String,
    filepath: Option<PathBuf>,
    registry: Option<ModuleKind>,
}

impl ModuleMeta {
    /// Create identity in the default category. The id is lowercased.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: normalize(id.as_ref()),
            category: DEFAULT_CATEGORY.to_string(),
            filepath: None,
            registry: None,
        }
    }

    pub fn with_category(mut self, category: impl AsRef<str>) -> Self {
        self.category = normalize(category.as_ref());
        self
    }

    pub(crate) fn from_definition(definition: &ModuleDefinition) -> Self {
        let meta = Self::new(definition.id());
        match definition.category() {
            Some(category) => meta.with_category(category),
            None => meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// File the module was loaded from; `None` for modules registered in code
    pub fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    /// Kind of the registry the module was registered with
    pub fn registry(&self) -> Option<ModuleKind> {
        self.registry
    }

    pub(crate) fn attach(&mut self, registry: ModuleKind, filepath: Option<PathBuf>) {
        self.registry = Some(registry);
        self.filepath = filepath;
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.to_lowercase()
}

/// A module variant a [`Registry`](crate::Registry) can own
pub trait Module: Send + Sync + Sized + 'static {
    /// Definitions of any other kind are skipped during discovery
    const KIND: ModuleKind;

    /// Executable behavior registered by name with the registry
    type Exec: ?Sized + Send + Sync;

    /// Secondary state the registry keeps alongside its modules
    type Index: RegistryIndex<Self>;

    fn meta(&self) -> &ModuleMeta;

    fn meta_mut(&mut self) -> &mut ModuleMeta;

    /// Build a module from a loaded definition of kind [`Self::KIND`]
    fn from_definition(
        definition: &ModuleDefinition,
        exec: Option<Arc<Self::Exec>>,
    ) -> Result<Self, RegistryError>;

    fn id(&self) -> &str {
        self.meta().id()
    }

    fn category(&self) -> &str {
        self.meta().category()
    }

    fn filepath(&self) -> Option<&Path> {
        self.meta().filepath()
    }

    /// Snapshot used in event payloads
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: self.id().to_string(),
            category: self.category().to_string(),
            kind: Self::KIND,
            filepath: self.filepath().map(Path::to_path_buf),
        }
    }
}

/// Snapshot of a module's identity carried by events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub id: String,
    pub category: String,
    pub kind: ModuleKind,
    pub filepath: Option<PathBuf>,
}

/// A module with identity only
#[derive(Debug, Clone)]
pub struct BasicModule {
    meta: ModuleMeta,
}

impl BasicModule {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            meta: ModuleMeta::new(id),
        }
    }

    pub fn with_category(mut self, category: impl AsRef<str>) -> Self {
        self.meta = self.meta.with_category(category);
        self
    }
}

impl Module for BasicModule {
    const KIND: ModuleKind = ModuleKind::Module;
    type Exec = ();
    type Index = ();

    fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ModuleMeta {
        &mut self.meta
    }

    fn from_definition(
        definition: &ModuleDefinition,
        _exec: Option<Arc<()>>,
    ) -> Result<Self, RegistryError> {
        match definition {
            ModuleDefinition::Module(_) => Ok(Self {
                meta: ModuleMeta::from_definition(definition),
            }),
            other => Err(RegistryError::InvalidType {
                name: other.id().to_string(),
                expected: "a module definition",
            }),
        }
    }
}

/// What to load: a definition file or a module built in code
pub enum LoadSource<M> {
    Path(PathBuf),
    Instance(M),
}

impl<M> From<PathBuf> for LoadSource<M> {
    fn from(path: PathBuf) -> Self {
        LoadSource::Path(path)
    }
}

impl<M> From<&Path> for LoadSource<M> {
    fn from(path: &Path) -> Self {
        LoadSource::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_normalizes_id_and_category() {
        let meta = ModuleMeta::new("Build").with_category("Tools");
        assert_eq!(meta.id(), "build");
        assert_eq!(meta.category(), "tools");
        assert!(meta.filepath().is_none());
        assert!(meta.registry().is_none());
    }

    #[test]
    fn test_default_category() {
        let module = BasicModule::new("core");
        assert_eq!(module.category(), DEFAULT_CATEGORY);
        assert_eq!(module.info().kind, ModuleKind::Module);
    }

    #[test]
    fn test_from_definition_rejects_other_kinds() {
        let definition = ModuleDefinition::from_value(serde_json::json!({
            "kind": "command", "id": "build"
        }))
        .unwrap();
        let result = BasicModule::from_definition(&definition, None);
        assert!(matches!(result, Err(RegistryError::InvalidType { .. })));
    }
}
