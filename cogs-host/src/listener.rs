//! Listener modules
//!
//! A listener names an event source and an event; once registered, its exec
//! runs for every payload published under that event (or only the first one
//! in [`ListenerMode::Once`]).

use crate::error::RegistryError;
use crate::events::{EventPayload, EventSource};
use crate::listener_registry::ListenerTable;
use crate::module::{Module, ModuleMeta};
use cogs_api::{ListenerMode, ModuleDefinition, ModuleKind};
use std::fmt;
use std::sync::Arc;

/// Event source a listener attaches to
#[derive(Clone)]
pub enum EmitterRef {
    /// A concrete source
    Source(Arc<dyn EventSource>),
    /// A source registered by name with the listener registry
    Named(String),
}

impl EmitterRef {
    pub fn source<S: EventSource + 'static>(source: Arc<S>) -> Self {
        EmitterRef::Source(source)
    }

    pub fn named(name: impl Into<String>) -> Self {
        EmitterRef::Named(name.into())
    }
}

impl fmt::Debug for EmitterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitterRef::Source(_) => f.write_str("Source(..)"),
            EmitterRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<&str> for EmitterRef {
    fn from(name: &str) -> Self {
        EmitterRef::Named(name.to_string())
    }
}

impl From<String> for EmitterRef {
    fn from(name: String) -> Self {
        EmitterRef::Named(name)
    }
}

impl From<Arc<dyn EventSource>> for EmitterRef {
    fn from(source: Arc<dyn EventSource>) -> Self {
        EmitterRef::Source(source)
    }
}

/// Options for [`Listener::new`]; `emitter` and `event` are required
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    pub category: Option<String>,
    pub emitter: Option<EmitterRef>,
    pub event: Option<String>,
    pub mode: ListenerMode,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn emitter(mut self, emitter: impl Into<EmitterRef>) -> Self {
        self.emitter = Some(emitter.into());
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn once(mut self) -> Self {
        self.mode = ListenerMode::Once;
        self
    }
}

/// Executable behavior of a listener
///
/// Runs synchronously inside the publishing call. The provided `exec` fails
/// with [`RegistryError::NoAbstractExec`].
pub trait ListenerExec: Send + Sync {
    fn exec(&self, listener: &Listener, payload: &EventPayload) -> anyhow::Result<()> {
        let _ = payload;
        Err(RegistryError::NoAbstractExec {
            kind: ModuleKind::Listener,
            id: listener.id().to_string(),
        }
        .into())
    }
}

struct AbstractExec;

impl ListenerExec for AbstractExec {}

/// Adapter turning a closure into a [`ListenerExec`]
pub struct ListenerFn<F>(F);

/// Wrap a closure as listener exec
pub fn listener_fn<F>(f: F) -> ListenerFn<F>
where
    F: Fn(&EventPayload) -> anyhow::Result<()> + Send + Sync + 'static,
{
    ListenerFn(f)
}

impl<F> ListenerExec for ListenerFn<F>
where
    F: Fn(&EventPayload) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn exec(&self, _listener: &Listener, payload: &EventPayload) -> anyhow::Result<()> {
        (self.0)(payload)
    }
}

/// A module bound to an event on some event source
pub struct Listener {
    meta: ModuleMeta,
    emitter: EmitterRef,
    event: String,
    mode: ListenerMode,
    exec: Arc<dyn ListenerExec>,
}

impl Listener {
    /// Create a listener with abstract exec
    ///
    /// Fails with [`RegistryError::MissingParameter`] when `emitter` or
    /// `event` is missing.
    pub fn new(id: impl AsRef<str>, options: ListenerOptions) -> Result<Self, RegistryError> {
        let mut meta = ModuleMeta::new(id);
        if let Some(category) = &options.category {
            meta = meta.with_category(category);
        }
        Self::from_parts(meta, options.emitter, options.event, options.mode, None)
    }

    fn from_parts(
        meta: ModuleMeta,
        emitter: Option<EmitterRef>,
        event: Option<String>,
        mode: ListenerMode,
        exec: Option<Arc<dyn ListenerExec>>,
    ) -> Result<Self, RegistryError> {
        let missing = |parameter| RegistryError::MissingParameter {
            kind: ModuleKind::Listener,
            id: meta.id().to_string(),
            parameter,
        };

        let emitter = match emitter {
            Some(EmitterRef::Named(name)) if name.is_empty() => return Err(missing("emitter")),
            Some(emitter) => emitter,
            None => return Err(missing("emitter")),
        };
        let event = match event {
            Some(event) if !event.is_empty() => event,
            _ => return Err(missing("event")),
        };

        Ok(Self {
            meta,
            emitter,
            event,
            mode,
            exec: exec.unwrap_or_else(|| Arc::new(AbstractExec)),
        })
    }

    pub fn with_exec(mut self, exec: impl ListenerExec + 'static) -> Self {
        self.exec = Arc::new(exec);
        self
    }

    pub fn emitter(&self) -> &EmitterRef {
        &self.emitter
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn mode(&self) -> ListenerMode {
        self.mode
    }

    pub fn exec(&self, payload: &EventPayload) -> anyhow::Result<()> {
        self.exec.exec(self, payload)
    }

    /// Run exec for a published payload, logging failures
    pub(crate) fn invoke(&self, payload: &EventPayload) {
        if let Err(e) = self.exec(payload) {
            tracing::warn!(
                id = %self.id(),
                event = %self.event,
                error = %e,
                "Listener failed"
            );
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("meta", &self.meta)
            .field("emitter", &self.emitter)
            .field("event", &self.event)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Module for Listener {
    const KIND: ModuleKind = ModuleKind::Listener;
    type Exec = dyn ListenerExec;
    type Index = ListenerTable;

    fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ModuleMeta {
        &mut self.meta
    }

    fn from_definition(
        definition: &ModuleDefinition,
        exec: Option<Arc<dyn ListenerExec>>,
    ) -> Result<Self, RegistryError> {
        match definition {
            ModuleDefinition::Listener(def) => Self::from_parts(
                ModuleMeta::from_definition(definition),
                def.emitter.clone().map(EmitterRef::Named),
                def.event.clone(),
                def.mode,
                exec,
            ),
            other => Err(RegistryError::InvalidType {
                name: other.id().to_string(),
                expected: "a listener definition",
            }),
        }
    }
}
