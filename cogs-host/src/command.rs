//! Command modules
//!
//! A command pairs a declarative [`CommandSpec`] (aliases, argument, flag and
//! prompt schemas) with an exec implementation looked up by handler name.

use crate::command_registry::CommandTable;
use crate::error::RegistryError;
use crate::module::{normalize, Module, ModuleMeta};
use async_trait::async_trait;
use cogs_api::{ArgSpec, CommandSpec, FlagSpec, ModuleDefinition, ModuleKind, PromptQuestion};
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Data handed to a command's exec
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandExecData {
    /// Full argument vector, command token included
    pub argv: Vec<String>,
    /// Parsed positional arguments, when the command declares any schema
    pub args: Option<Map<String, Value>>,
    /// Parsed flags, when the command declares any schema
    pub flags: Option<Map<String, Value>>,
    /// Prompt answers, when the command declares questions
    pub prompt: Option<Map<String, Value>>,
}

impl CommandExecData {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            ..Self::default()
        }
    }

    /// Parsed positional argument by name
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.as_ref().and_then(|args| args.get(name))
    }

    /// Parsed flag by name
    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.as_ref().and_then(|flags| flags.get(name))
    }

    /// Prompt answer by question name
    pub fn answer(&self, name: &str) -> Option<&Value> {
        self.prompt.as_ref().and_then(|answers| answers.get(name))
    }
}

/// Executable behavior of a command
///
/// The provided `exec` fails with [`RegistryError::NoAbstractExec`]; an
/// implementation that does not override it marks an incomplete command.
#[async_trait]
pub trait CommandExec: Send + Sync {
    async fn exec(&self, command: &Command, data: &CommandExecData) -> anyhow::Result<()> {
        let _ = data;
        Err(RegistryError::NoAbstractExec {
            kind: ModuleKind::Command,
            id: command.id().to_string(),
        }
        .into())
    }
}

/// Exec used for commands without a registered implementation
struct AbstractExec;

impl CommandExec for AbstractExec {}

/// Adapter turning an async closure into a [`CommandExec`]
pub struct ExecFn<F>(F);

/// Wrap an async closure as command exec
///
/// ```rust,ignore
/// registry.define("build", Arc::new(exec_fn(|data| async move {
///     println!("building {:?}", data.arg("target"));
///     Ok(())
/// })));
/// ```
pub fn exec_fn<F, Fut>(f: F) -> ExecFn<F>
where
    F: Fn(CommandExecData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    ExecFn(f)
}

#[async_trait]
impl<F, Fut> CommandExec for ExecFn<F>
where
    F: Fn(CommandExecData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn exec(&self, _command: &Command, data: &CommandExecData) -> anyhow::Result<()> {
        (self.0)(data.clone()).await
    }
}

/// A module that responds to an argument vector
pub struct Command {
    meta: ModuleMeta,
    spec: CommandSpec,
    exec: Arc<dyn CommandExec>,
}

impl Command {
    /// Create a command with abstract exec. Aliases are lowercased.
    pub fn new(id: impl AsRef<str>, spec: CommandSpec) -> Self {
        Self::from_parts(ModuleMeta::new(id), spec, None)
    }

    fn from_parts(meta: ModuleMeta, mut spec: CommandSpec, exec: Option<Arc<dyn CommandExec>>) -> Self {
        spec.aliases = spec.aliases.iter().map(|a| normalize(a)).collect();
        Self {
            meta,
            spec,
            exec: exec.unwrap_or_else(|| Arc::new(AbstractExec)),
        }
    }

    pub fn with_category(mut self, category: impl AsRef<str>) -> Self {
        self.meta = self.meta.with_category(category);
        self
    }

    pub fn with_exec(mut self, exec: impl CommandExec + 'static) -> Self {
        self.exec = Arc::new(exec);
        self
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn aliases(&self) -> &[String] {
        &self.spec.aliases
    }

    pub fn description(&self) -> Option<&str> {
        self.spec.description.as_deref()
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.spec.args
    }

    pub fn flags(&self) -> &[FlagSpec] {
        &self.spec.flags
    }

    pub fn prompt(&self) -> &[PromptQuestion] {
        &self.spec.prompt
    }

    /// Whether dispatch needs to run the argument parser
    pub fn declares_arguments(&self) -> bool {
        !self.spec.args.is_empty() || !self.spec.flags.is_empty()
    }

    /// Whether dispatch needs to run the prompter
    pub fn declares_prompt(&self) -> bool {
        !self.spec.prompt.is_empty()
    }

    pub async fn exec(&self, data: &CommandExecData) -> anyhow::Result<()> {
        self.exec.exec(self, data).await
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("meta", &self.meta)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Module for Command {
    const KIND: ModuleKind = ModuleKind::Command;
    type Exec = dyn CommandExec;
    type Index = CommandTable;

    fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ModuleMeta {
        &mut self.meta
    }

    fn from_definition(
        definition: &ModuleDefinition,
        exec: Option<Arc<dyn CommandExec>>,
    ) -> Result<Self, RegistryError> {
        match definition {
            ModuleDefinition::Command(def) => Ok(Self::from_parts(
                ModuleMeta::from_definition(definition),
                def.spec.clone(),
                exec,
            )),
            other => Err(RegistryError::InvalidType {
                name: other.id().to_string(),
                expected: "a command definition",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Incomplete;

    impl CommandExec for Incomplete {}

    #[test]
    fn test_aliases_are_normalized() {
        let command = Command::new("Build", CommandSpec::new().alias("BUILD").alias("b"));
        assert_eq!(command.id(), "build");
        assert_eq!(command.aliases(), ["build", "b"]);
        assert!(!command.declares_arguments());
        assert!(!command.declares_prompt());
    }

    #[test]
    fn test_declares_arguments_with_flags_only() {
        let command = Command::new("build", CommandSpec::new().flag(FlagSpec::switch("release")));
        assert!(command.declares_arguments());
    }

    #[tokio::test]
    async fn test_default_exec_is_abstract() {
        let command = Command::new("build", CommandSpec::new()).with_exec(Incomplete);
        let err = command.exec(&CommandExecData::default()).await.unwrap_err();
        let err = err.downcast::<RegistryError>().unwrap();
        assert!(matches!(err, RegistryError::NoAbstractExec { ref id, .. } if id == "build"));

        let command = Command::new("clean", CommandSpec::new());
        assert!(command.exec(&CommandExecData::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_exec_fn_receives_data() {
        let command = Command::new("echo", CommandSpec::new()).with_exec(exec_fn(|data| async move {
            anyhow::ensure!(data.argv == ["echo", "hi"], "unexpected argv {:?}", data.argv);
            Ok(())
        }));

        let data = CommandExecData::new(vec!["echo".to_string(), "hi".to_string()]);
        assert!(command.exec(&data).await.is_ok());
    }
}
