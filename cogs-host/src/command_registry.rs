//! Command registry: alias table and dispatch
//!
//! Every command alias (and the alias derived by the optional replacement
//! pattern) maps to the owning command id. Dispatch resolves the first token
//! through that table, then parses, prompts and executes strictly in order,
//! publishing an event for each phase.

use crate::command::{Command, CommandExecData};
use crate::error::RegistryError;
use crate::events::{EventPayload, EventSource};
use crate::module::{Module, ModuleInfo};
use crate::parser::{ArgParser, ClapParser};
use crate::prompt::{NonInteractivePrompter, Prompter};
use crate::registry::{Registry, RegistryIndex};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of commands
pub type CommandRegistry = Registry<Command>;

/// Command-specific registry state
pub struct CommandTable {
    aliases: HashMap<String, String>,
    alias_replacement: Option<Regex>,
    parser: Arc<dyn ArgParser>,
    prompter: Arc<dyn Prompter>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
            alias_replacement: None,
            parser: Arc::new(ClapParser::new()),
            prompter: Arc::new(NonInteractivePrompter),
        }
    }
}

impl CommandTable {
    /// Alias keys for a command: each alias, then its derived form when it differs
    fn alias_keys(&self, command: &Command) -> Vec<String> {
        let mut keys = Vec::with_capacity(command.aliases().len());
        for alias in command.aliases() {
            keys.push(alias.clone());
            if let Some(pattern) = &self.alias_replacement {
                let derived = pattern.replace_all(alias, "");
                if !derived.is_empty() && derived != alias.as_str() {
                    keys.push(derived.into_owned());
                }
            }
        }
        keys
    }
}

impl RegistryIndex<Command> for CommandTable {
    fn register_module(&mut self, command: &Arc<Command>) -> Result<(), RegistryError> {
        let keys = self.alias_keys(command);

        // Check every key before inserting any so a conflict changes nothing.
        for key in &keys {
            if let Some(owner) = self.aliases.get(key) {
                if owner != command.id() {
                    return Err(RegistryError::AliasConflict {
                        alias: key.clone(),
                        id: command.id().to_string(),
                        conflict: owner.clone(),
                    });
                }
            }
        }

        for key in keys {
            self.aliases.insert(key, command.id().to_string());
        }
        Ok(())
    }

    fn deregister_module(&mut self, command: &Arc<Command>) -> Result<(), RegistryError> {
        self.aliases.retain(|_, owner| owner != command.id());
        Ok(())
    }
}

impl Registry<Command> {
    /// Derive an extra alias from every alias by deleting the pattern's matches
    ///
    /// With `^-+` both `--build` and `build` resolve to a command declaring
    /// only `--build`. Applies to commands registered afterwards.
    pub fn with_alias_replacement(mut self, pattern: Regex) -> Self {
        self.index.alias_replacement = Some(pattern);
        self
    }

    pub fn alias_replacement(&self) -> Option<&Regex> {
        self.index.alias_replacement.as_ref()
    }

    /// Replace the argument parser used during dispatch
    pub fn set_parser(&mut self, parser: Arc<dyn ArgParser>) -> &mut Self {
        self.index.parser = parser;
        self
    }

    /// Replace the prompter used during dispatch
    pub fn set_prompter(&mut self, prompter: Arc<dyn Prompter>) -> &mut Self {
        self.index.prompter = prompter;
        self
    }

    /// Command owning `alias`
    pub fn resolve(&self, alias: &str) -> Option<&Arc<Command>> {
        self.index
            .aliases
            .get(alias)
            .and_then(|id| self.modules().get(id))
    }

    /// Alias table, alias to command id
    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.index.aliases
    }

    /// Dispatch one argument vector
    ///
    /// Returns `true` when the command ran to completion. Unknown commands and
    /// failures in the parser, the prompter or the command itself are reported
    /// through events and yield `false`.
    pub async fn handle(&self, argv: &[String]) -> bool {
        let argv = argv.to_vec();
        let Some(command) = argv.first().and_then(|token| self.resolve(token)).cloned() else {
            tracing::debug!(?argv, "No command matches argument vector");
            self.publish(&EventPayload::InvalidCommand { argv });
            return false;
        };

        let info = command.info();
        let mut data = CommandExecData::new(argv.clone());

        if command.declares_arguments() {
            let parser = Arc::clone(&self.index.parser);
            match parser.parse(&command, &argv[1..]).await {
                Ok(parsed) => {
                    data.args = Some(parsed.args);
                    data.flags = Some(parsed.flags);
                }
                Err(e) => return self.fail(anyhow::Error::new(e), info, data),
            }
        }

        if command.declares_prompt() {
            self.publish(&EventPayload::PromptStarted {
                command: info.clone(),
                argv: argv.clone(),
            });
            let prompter = Arc::clone(&self.index.prompter);
            match prompter.prompt(command.prompt()).await {
                Ok(answers) => data.prompt = Some(answers),
                Err(e) => return self.fail(anyhow::Error::new(e), info, data),
            }
            self.publish(&EventPayload::PromptFinished {
                command: info.clone(),
                argv: argv.clone(),
            });
        }

        tracing::debug!(id = %command.id(), "Command started");
        self.publish(&EventPayload::CommandStarted {
            command: info.clone(),
            argv: argv.clone(),
            data: data.clone(),
        });

        if let Err(e) = command.exec(&data).await {
            return self.fail(e, info, data);
        }

        tracing::debug!(id = %command.id(), "Command finished");
        self.publish(&EventPayload::CommandFinished {
            command: info,
            argv,
            data,
        });
        true
    }

    /// Dispatch `argv`, or the process arguments minus the executable, then emit `end`
    pub async fn run(&self, argv: Option<Vec<String>>) -> bool {
        let argv = argv.unwrap_or_else(|| std::env::args().skip(1).collect());
        let successful = self.handle(&argv).await;

        self.publish(&EventPayload::End { successful });
        tracing::info!(successful, "Dispatch finished");
        successful
    }

    fn fail(&self, error: anyhow::Error, command: ModuleInfo, data: CommandExecData) -> bool {
        tracing::debug!(id = %command.id, error = %error, "Command failed");
        self.publish(&EventPayload::Error {
            error: Arc::new(error),
            command,
            argv: data.argv.clone(),
            data,
        });
        false
    }
}
