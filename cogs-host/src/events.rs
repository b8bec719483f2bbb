//! Event sources and lifecycle events
//!
//! Registries report every lifecycle step (load, remove, each dispatch phase)
//! as an [`EventPayload`] published on an [`EventSource`]. Listeners attach to
//! any event source, including the registries themselves.

use crate::command::CommandExecData;
use crate::module::ModuleInfo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Event names published by registries and the CLI
pub mod names {
    pub const LOAD: &str = "load";
    pub const REMOVE: &str = "remove";
    pub const COMMAND_STARTED: &str = "commandStarted";
    pub const COMMAND_FINISHED: &str = "commandFinished";
    pub const ERROR: &str = "error";
    pub const INVALID_COMMAND: &str = "invalidCommand";
    pub const PROMPT_STARTED: &str = "promptStarted";
    pub const PROMPT_FINISHED: &str = "promptFinished";
    pub const END: &str = "end";
}

/// Payload carried by a published event
#[derive(Debug, Clone)]
pub enum EventPayload {
    Load {
        module: ModuleInfo,
        is_reload: bool,
    },
    Remove {
        module: ModuleInfo,
    },
    InvalidCommand {
        argv: Vec<String>,
    },
    PromptStarted {
        command: ModuleInfo,
        argv: Vec<String>,
    },
    PromptFinished {
        command: ModuleInfo,
        argv: Vec<String>,
    },
    CommandStarted {
        command: ModuleInfo,
        argv: Vec<String>,
        data: CommandExecData,
    },
    CommandFinished {
        command: ModuleInfo,
        argv: Vec<String>,
        data: CommandExecData,
    },
    Error {
        error: Arc<anyhow::Error>,
        command: ModuleInfo,
        argv: Vec<String>,
        data: CommandExecData,
    },
    End {
        successful: bool,
    },
    /// Application-defined event arguments
    Custom(Vec<serde_json::Value>),
}

impl EventPayload {
    /// Event name this payload is published under, `None` for custom payloads
    pub fn name(&self) -> Option<&'static str> {
        match self {
            EventPayload::Load { .. } => Some(names::LOAD),
            EventPayload::Remove { .. } => Some(names::REMOVE),
            EventPayload::InvalidCommand { .. } => Some(names::INVALID_COMMAND),
            EventPayload::PromptStarted { .. } => Some(names::PROMPT_STARTED),
            EventPayload::PromptFinished { .. } => Some(names::PROMPT_FINISHED),
            EventPayload::CommandStarted { .. } => Some(names::COMMAND_STARTED),
            EventPayload::CommandFinished { .. } => Some(names::COMMAND_FINISHED),
            EventPayload::Error { .. } => Some(names::ERROR),
            EventPayload::End { .. } => Some(names::END),
            EventPayload::Custom(_) => None,
        }
    }
}

/// Identity of a single subscription, used to detach it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Callback invoked with each published payload
pub type EventHandler = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Anything listeners can subscribe to
///
/// Registries, the CLI and [`EventEmitter`] implement this; applications can
/// register their own sources with the listener registry.
pub trait EventSource: Send + Sync {
    /// Subscribe persistently
    fn on(&self, event: &str, handler: EventHandler) -> SubscriptionId;

    /// Subscribe for a single delivery
    fn once(&self, event: &str, handler: EventHandler) -> SubscriptionId;

    /// Publish to every subscriber of `event`, returning how many were called
    fn emit(&self, event: &str, payload: &EventPayload) -> usize;

    /// Detach a subscription, returning whether it was still attached
    fn off(&self, event: &str, subscription: SubscriptionId) -> bool;

    /// Whether a subscription is still attached; `once` subscriptions detach when they fire
    fn is_subscribed(&self, event: &str, subscription: SubscriptionId) -> bool;

    /// Publish a lifecycle payload under its own name
    fn publish(&self, payload: &EventPayload) -> usize {
        match payload.name() {
            Some(event) => self.emit(event, payload),
            None => 0,
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
    once: bool,
}

/// Thread-safe in-process event source
#[derive(Default)]
pub struct EventEmitter {
    subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shareable emitter
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of subscriptions attached to `event`
    pub fn listener_count(&self, event: &str) -> usize {
        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.get(event).map(Vec::len).unwrap_or(0)
    }

    fn subscribe(&self, event: &str, handler: EventHandler, once: bool) -> SubscriptionId {
        let id = SubscriptionId::next();
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions
            .entry(event.to_string())
            .or_default()
            .push(Subscription { id, handler, once });
        id
    }
}

impl EventSource for EventEmitter {
    fn on(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        self.subscribe(event, handler, false)
    }

    fn once(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        self.subscribe(event, handler, true)
    }

    fn emit(&self, event: &str, payload: &EventPayload) -> usize {
        // Handlers run outside the lock so they may subscribe or emit themselves.
        let handlers: Vec<EventHandler> = {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(entries) = subscriptions.get_mut(event) else {
                return 0;
            };
            let handlers = entries.iter().map(|s| Arc::clone(&s.handler)).collect();
            entries.retain(|s| !s.once);
            if entries.is_empty() {
                subscriptions.remove(event);
            }
            handlers
        };

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    fn off(&self, event: &str, subscription: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = subscriptions.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|s| s.id != subscription);
        let removed = entries.len() != before;
        if entries.is_empty() {
            subscriptions.remove(event);
        }
        removed
    }

    fn is_subscribed(&self, event: &str, subscription: SubscriptionId) -> bool {
        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions
            .get(event)
            .is_some_and(|entries| entries.iter().any(|s| s.id == subscription))
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut events: Vec<_> = subscriptions.keys().collect();
        events.sort();
        f.debug_struct("EventEmitter")
            .field("events", &events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let handler: EventHandler = Arc::new(move |_: &EventPayload| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn test_on_receives_every_emit() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        emitter.on("ready", handler);

        emitter.emit("ready", &EventPayload::Custom(vec![]));
        emitter.emit("ready", &EventPayload::Custom(vec![]));
        emitter.emit("other", &EventPayload::Custom(vec![]));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        let id = emitter.once("ready", handler);
        assert!(emitter.is_subscribed("ready", id));

        assert_eq!(emitter.emit("ready", &EventPayload::Custom(vec![])), 1);
        assert_eq!(emitter.emit("ready", &EventPayload::Custom(vec![])), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("ready"), 0);
        assert!(!emitter.is_subscribed("ready", id));
    }

    #[test]
    fn test_off_detaches_by_identity() {
        let emitter = EventEmitter::new();
        let (first_count, first) = counter();
        let (second_count, second) = counter();
        let first_id = emitter.on("ready", first);
        emitter.on("ready", second);

        assert!(emitter.off("ready", first_id));
        assert!(!emitter.off("ready", first_id));
        emitter.emit("ready", &EventPayload::Custom(vec![]));

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_uses_payload_name() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        emitter.on(names::END, handler);

        emitter.publish(&EventPayload::End { successful: true });
        assert_eq!(emitter.publish(&EventPayload::Custom(vec![])), 0);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_emit_reentrantly() {
        let emitter = Arc::new(EventEmitter::new());
        let (count, handler) = counter();
        emitter.on("second", handler);

        let inner = Arc::clone(&emitter);
        emitter.on(
            "first",
            Arc::new(move |payload: &EventPayload| {
                inner.emit("second", payload);
            }),
        );

        emitter.emit("first", &EventPayload::Custom(vec![]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
