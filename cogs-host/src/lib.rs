//! cogs-host: module registries for cogs
//!
//! This crate owns discovered modules: it loads definitions from disk,
//! indexes commands by alias and dispatches argument vectors to them, and
//! binds listeners to event sources.

pub mod command;
pub mod command_registry;
pub mod discovery;
pub mod error;
pub mod events;
pub mod listener;
pub mod listener_registry;
pub mod loader;
pub mod module;
pub mod parser;
pub mod prompt;
pub mod registry;
pub mod watcher;

pub use command::{exec_fn, Command, CommandExec, CommandExecData, ExecFn};
pub use command_registry::{CommandRegistry, CommandTable};
pub use discovery::DiscoveryError;
pub use error::RegistryError;
pub use events::{names, EventEmitter, EventHandler, EventPayload, EventSource, SubscriptionId};
pub use listener::{listener_fn, EmitterRef, Listener, ListenerExec, ListenerFn, ListenerOptions};
pub use listener_registry::{ListenerRegistry, ListenerTable};
pub use loader::{DefinitionLoader, LoaderError, ManifestLoader};
pub use module::{BasicModule, LoadSource, Module, ModuleInfo, ModuleMeta};
pub use parser::{ArgParser, ClapParser, ParseError, ParsedArgs};
pub use prompt::{Answers, NonInteractivePrompter, PromptError, Prompter, ScriptedPrompter};
pub use registry::{Registry, RegistryConfig, RegistryIndex, SharedRegistry};
pub use watcher::{HotReloadWatcher, WatcherConfig, WatcherError};

pub use regex::Regex;

pub use cogs_api::{
    ArgSpec, CommandSpec, FlagSpec, ListenerMode, ModuleDefinition, ModuleKind, PromptQuestion,
    QuestionKind, ValueType,
};
