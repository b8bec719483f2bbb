//! Listener registry: named event sources and listener bindings

use crate::error::RegistryError;
use crate::events::{EventHandler, EventPayload, EventSource, SubscriptionId};
use crate::listener::{EmitterRef, Listener};
use crate::module::{normalize, Module};
use crate::registry::{Registry, RegistryIndex};
use cogs_api::ListenerMode;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of listeners
pub type ListenerRegistry = Registry<Listener>;

/// An attached listener subscription
struct Binding {
    source: Arc<dyn EventSource>,
    event: String,
    subscription: SubscriptionId,
}

/// Listener-specific registry state
#[derive(Default)]
pub struct ListenerTable {
    emitters: HashMap<String, Arc<dyn EventSource>>,
    bindings: HashMap<String, Binding>,
}

impl ListenerTable {
    fn resolve(&self, emitter: &EmitterRef) -> Result<Arc<dyn EventSource>, RegistryError> {
        match emitter {
            EmitterRef::Source(source) => Ok(Arc::clone(source)),
            EmitterRef::Named(name) => self
                .emitters
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::not_an_event_source(name.as_str())),
        }
    }

    /// Subscribe the listener, replacing any earlier subscription
    fn bind(&mut self, listener: &Arc<Listener>) -> Result<(), RegistryError> {
        let source = self.resolve(listener.emitter())?;
        self.unbind(listener.id());

        // The source may be owned by the listener itself; hold it weakly.
        let weak = Arc::downgrade(listener);
        let handler: EventHandler = Arc::new(move |payload: &EventPayload| {
            if let Some(listener) = weak.upgrade() {
                listener.invoke(payload);
            }
        });

        let subscription = match listener.mode() {
            ListenerMode::Once => source.once(listener.event(), handler),
            ListenerMode::On => source.on(listener.event(), handler),
        };
        tracing::debug!(
            id = %listener.id(),
            event = %listener.event(),
            mode = ?listener.mode(),
            "Listener attached"
        );

        self.bindings.insert(
            listener.id().to_string(),
            Binding {
                source,
                event: listener.event().to_string(),
                subscription,
            },
        );
        Ok(())
    }

    fn unbind(&mut self, id: &str) -> bool {
        match self.bindings.remove(id) {
            Some(binding) => binding.source.off(&binding.event, binding.subscription),
            None => false,
        }
    }
}

impl RegistryIndex<Listener> for ListenerTable {
    fn register_module(&mut self, listener: &Arc<Listener>) -> Result<(), RegistryError> {
        self.bind(listener)
    }

    fn deregister_module(&mut self, listener: &Arc<Listener>) -> Result<(), RegistryError> {
        self.unbind(listener.id());
        Ok(())
    }
}

impl Registry<Listener> {
    /// Register named event sources
    ///
    /// Every value is checked before any is stored; a [`EmitterRef::Named`]
    /// value fails with [`RegistryError::InvalidType`] naming its key.
    pub fn set_emitters<I, K>(&mut self, emitters: I) -> Result<&mut Self, RegistryError>
    where
        I: IntoIterator<Item = (K, EmitterRef)>,
        K: Into<String>,
    {
        let mut sources = Vec::new();
        for (key, value) in emitters {
            let key = key.into();
            match value {
                EmitterRef::Source(source) => sources.push((key, source)),
                EmitterRef::Named(_) => return Err(RegistryError::not_an_event_source(key)),
            }
        }

        self.index.emitters.extend(sources);
        Ok(self)
    }

    /// Register one named event source
    pub fn set_emitter(&mut self, name: impl Into<String>, source: Arc<dyn EventSource>) -> &mut Self {
        self.index.emitters.insert(name.into(), source);
        self
    }

    pub fn emitters(&self) -> &HashMap<String, Arc<dyn EventSource>> {
        &self.index.emitters
    }

    /// Whether the listener currently holds a live subscription
    ///
    /// A `once` listener stops being bound after it has fired.
    pub fn is_bound(&self, id: &str) -> bool {
        self.index
            .bindings
            .get(&normalize(id))
            .is_some_and(|binding| binding.source.is_subscribed(&binding.event, binding.subscription))
    }

    /// Subscribe a registered listener to its event source
    pub fn add_to_emitter(&mut self, id: &str) -> Result<Arc<Listener>, RegistryError> {
        let listener = self.require(id)?;
        self.index.bind(&listener)?;
        Ok(listener)
    }

    /// Detach a registered listener from its event source
    pub fn remove_from_emitter(&mut self, id: &str) -> Result<Arc<Listener>, RegistryError> {
        let listener = self.require(id)?;
        if !self.index.unbind(listener.id()) {
            // Still report a source that cannot be resolved.
            self.index.resolve(listener.emitter())?;
        }
        tracing::debug!(id = %listener.id(), "Listener detached");
        Ok(listener)
    }
}
