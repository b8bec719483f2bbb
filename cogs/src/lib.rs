//! # cogs
//!
//! Definition-driven command and listener framework for CLIs.
//!
//! Commands and listeners are described by JSON or MessagePack definition
//! files discovered below a directory. Their behavior is registered in Rust
//! by handler name, so the command surface can change without recompiling.
//!
//! ```ignore
//! use cogs::{exec_fn, Cli};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     cogs::tracing_support::init_subscriber();
//!
//!     let mut cli = Cli::new("deploy").with_package(cogs::package_info!());
//!     cli.commands_mut().define(
//!         "ship",
//!         Arc::new(exec_fn(|data| async move {
//!             println!("shipping {:?}", data.arg("target"));
//!             Ok(())
//!         })),
//!     );
//!     cli.load_all()?;
//!
//!     let successful = cli.run_env().await;
//!     std::process::exit(Cli::exit_code(successful));
//! }
//! ```

pub mod cli;
#[cfg(feature = "inquire")]
pub mod terminal_prompt;
pub mod tracing_support;

pub use cli::{Cli, PackageInfo};
#[cfg(feature = "inquire")]
pub use terminal_prompt::InquirePrompter;

pub use cogs_api::{
    definition_hash, ArgSpec, CommandSpec, FlagSpec, ListenerMode, ModuleDefinition, ModuleKind,
    PromptQuestion, QuestionKind, ValueType,
};
pub use cogs_host::{
    exec_fn, listener_fn, names, ArgParser, BasicModule, ClapParser, Command, CommandExec,
    CommandExecData, CommandRegistry, DefinitionLoader, EmitterRef, EventEmitter, EventHandler,
    EventPayload, EventSource, HotReloadWatcher, Listener, ListenerExec, ListenerOptions,
    ListenerRegistry, LoadSource, ManifestLoader, Module, ModuleInfo, ModuleMeta,
    NonInteractivePrompter, ParseError, ParsedArgs, PromptError, Prompter, Registry,
    Regex, RegistryConfig, RegistryError, ScriptedPrompter, SharedRegistry, SubscriptionId,
    WatcherConfig, WatcherError,
};
