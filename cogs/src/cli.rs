//! CLI entry point
//!
//! [`Cli`] owns a command registry and a listener registry. Listeners can
//! attach to the CLI itself (`cli`), to the command registry (`commands`) or
//! to the listener registry (`listeners`) by name.

use cogs_host::{
    CommandRegistry, EventEmitter, EventHandler, EventPayload, EventSource, ListenerRegistry,
    Registry, RegistryConfig, RegistryError, SubscriptionId,
};
use serde::Serialize;
use std::sync::Arc;

/// Package metadata reported by the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

impl PackageInfo {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = non_empty(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = non_empty(author.into());
        self
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Package info of the calling crate, read from its Cargo metadata
#[macro_export]
macro_rules! package_info {
    () => {
        $crate::PackageInfo::new(env!("CARGO_PKG_VERSION"))
            .description(env!("CARGO_PKG_DESCRIPTION"))
            .author(env!("CARGO_PKG_AUTHORS"))
    };
}

/// A command line application built from command and listener modules
pub struct Cli {
    name: String,
    package: PackageInfo,
    events: Arc<EventEmitter>,
    commands: CommandRegistry,
    listeners: ListenerRegistry,
}

impl Cli {
    /// Create with registries for `./commands` and `./listeners`
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registries(
            name,
            Registry::new(RegistryConfig::for_commands()),
            Registry::new(RegistryConfig::for_listeners()),
        )
    }

    /// Create with existing registries
    ///
    /// The listener registry gains the `cli`, `commands` and `listeners`
    /// event sources.
    pub fn with_registries(
        name: impl Into<String>,
        commands: CommandRegistry,
        mut listeners: ListenerRegistry,
    ) -> Self {
        let events = EventEmitter::shared();
        let own = listeners.events();
        listeners
            .set_emitter("cli", events.clone())
            .set_emitter("commands", commands.events())
            .set_emitter("listeners", own);

        #[allow(unused_mut)]
        let mut cli = Self {
            name: name.into(),
            package: PackageInfo::default(),
            events,
            commands,
            listeners,
        };
        #[cfg(feature = "inquire")]
        cli.commands
            .set_prompter(Arc::new(crate::terminal_prompt::InquirePrompter::new()));
        cli
    }

    pub fn with_package(mut self, package: PackageInfo) -> Self {
        self.package = package;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    pub fn version(&self) -> Option<&str> {
        self.package.version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.package.description.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.package.author.as_deref()
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    /// Load both registries from their configured directories
    ///
    /// Listeners load first so they observe command `load` events.
    pub fn load_all(&mut self) -> Result<(), RegistryError> {
        let listeners = self.listeners.load_all(None)?;
        let commands = self.commands.load_all(None)?;
        tracing::info!(cli = %self.name, commands, listeners, "Modules loaded");
        Ok(())
    }

    /// Dispatch `argv`, or the process arguments minus the executable
    ///
    /// `end` is emitted on the command registry and then on the CLI.
    pub async fn run(&self, argv: Option<Vec<String>>) -> bool {
        let successful = self.commands.run(argv).await;
        self.events.publish(&EventPayload::End { successful });
        successful
    }

    /// Dispatch the process arguments
    pub async fn run_env(&self) -> bool {
        self.run(None).await
    }

    /// Process exit status for a dispatch result
    pub fn exit_code(successful: bool) -> i32 {
        if successful {
            0
        } else {
            1
        }
    }
}

impl EventSource for Cli {
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
