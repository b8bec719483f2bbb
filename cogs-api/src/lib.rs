//! cogs-api: Shared definition types for the cogs module system
//!
//! A module definition is a small declarative document (JSON or MessagePack)
//! describing one module: its kind, id, category and, for commands and
//! listeners, the schemas the host needs to wire it up. Executable behavior is
//! never part of a definition; hosts look it up by handler name.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Category assigned to modules that do not declare one
pub const DEFAULT_CATEGORY: &str = "default";

/// The module variant a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Plain module with identity only
    Module,
    /// Command dispatched from an argument vector
    Command,
    /// Listener bound to an event on an event source
    Listener,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Module => write!(f, "Module"),
            ModuleKind::Command => write!(f, "Command"),
            ModuleKind::Listener => write!(f, "Listener"),
        }
    }
}

/// A module definition, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleDefinition {
    Module(BasicDefinition),
    Command(CommandDefinition),
    Listener(ListenerDefinition),
}

/// Definition of a plain module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicDefinition {
    pub id: String,

    #[serde(default)]
    pub category: Option<String>,
}

/// Definition of a command module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub id: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Name of the registered exec implementation (defaults to the id)
    #[serde(default)]
    pub handler: Option<String>,

    #[serde(flatten)]
    pub spec: CommandSpec,
}

/// Definition of a listener module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerDefinition {
    pub id: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Name of the registered exec implementation (defaults to the id)
    #[serde(default)]
    pub handler: Option<String>,

    /// Name of the event source, resolved by the listener registry
    #[serde(default)]
    pub emitter: Option<String>,

    #[serde(default)]
    pub event: Option<String>,

    #[serde(rename = "type", default)]
    pub mode: ListenerMode,
}

/// Subscription mode of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerMode {
    /// Persistent subscription
    #[default]
    On,
    /// Fires at most once
    Once,
}

impl ModuleDefinition {
    /// Decode a definition from a JSON value.
    ///
    /// Objects without a `kind` member but with a `default` member are
    /// unwrapped until a tagged definition is found.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        while let Some(inner) = take_default(&mut value) {
            value = inner;
        }
        serde_json::from_value(value)
    }

    /// Decode a definition if `value` declares one.
    ///
    /// Returns `Ok(None)` when, after unwrapping `default`, there is no object
    /// carrying a `kind` member. A tagged object with bad fields is an error.
    pub fn find(mut value: Value) -> Result<Option<Self>, serde_json::Error> {
        while let Some(inner) = take_default(&mut value) {
            value = inner;
        }
        match value.as_object() {
            Some(map) if map.contains_key("kind") => serde_json::from_value(value).map(Some),
            _ => Ok(None),
        }
    }

    /// Encode as MessagePack with named fields
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleDefinition::Module(_) => ModuleKind::Module,
            ModuleDefinition::Command(_) => ModuleKind::Command,
            ModuleDefinition::Listener(_) => ModuleKind::Listener,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ModuleDefinition::Module(def) => &def.id,
            ModuleDefinition::Command(def) => &def.id,
            ModuleDefinition::Listener(def) => &def.id,
        }
    }

    /// Category as declared, before normalization
    pub fn category(&self) -> Option<&str> {
        match self {
            ModuleDefinition::Module(def) => def.category.as_deref(),
            ModuleDefinition::Command(def) => def.category.as_deref(),
            ModuleDefinition::Listener(def) => def.category.as_deref(),
        }
    }

    /// Name used to look up the exec implementation
    pub fn handler_name(&self) -> &str {
        match self {
            ModuleDefinition::Module(def) => &def.id,
            ModuleDefinition::Command(def) => def.handler.as_deref().unwrap_or(&def.id),
            ModuleDefinition::Listener(def) => def.handler.as_deref().unwrap_or(&def.id),
        }
    }
}

fn take_default(value: &mut Value) -> Option<Value> {
    let map = value.as_object_mut()?;
    if map.contains_key("kind") {
        return None;
    }
    map.remove("default")
}

/// Declarative command schema consumed by the parser and prompter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Lookup keys for dispatch
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Short description for help text
    #[serde(default)]
    pub description: Option<String>,

    /// Positional arguments, in order
    #[serde(default)]
    pub args: Vec<ArgSpec>,

    #[serde(default)]
    pub flags: Vec<FlagSpec>,

    /// Questions asked interactively before execution
    #[serde(default)]
    pub prompt: Vec<PromptQuestion>,
}

impl CommandSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a positional argument
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Add a flag
    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    /// Add a prompt question
    pub fn question(mut self, question: PromptQuestion) -> Self {
        self.prompt.push(question);
        self
    }
}

/// Value type of an argument or flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
}

/// Positional argument specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub value_type: ValueType,

    #[serde(default)]
    pub help: String,

    #[serde(default)]
    pub required: bool,

    #[serde(rename = "default", default)]
    pub default_value: Option<Value>,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::String,
            help: String::new(),
            required: false,
            default_value: None,
        }
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Flag specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Long name without leading dashes
    pub name: String,

    /// Alternative names; single characters become short flags
    #[serde(default, alias = "alias", deserialize_with = "one_or_many")]
    pub aliases: Vec<String>,

    #[serde(rename = "type", default)]
    pub value_type: ValueType,

    #[serde(default)]
    pub help: String,

    #[serde(default)]
    pub required: bool,

    #[serde(rename = "default", default)]
    pub default_value: Option<Value>,
}

impl FlagSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            value_type: ValueType::String,
            help: String::new(),
            required: false,
            default_value: None,
        }
    }

    /// Boolean switch
    pub fn switch(name: impl Into<String>) -> Self {
        Self::new(name).value_type(ValueType::Boolean)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(alias) => vec![alias],
        OneOrMany::Many(aliases) => aliases,
    })
}

/// Kind of interactive question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Input,
    Number,
    Confirm,
    Password,
    /// Pick one of `choices`
    List,
}

/// A single interactive question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptQuestion {
    /// Key of the answer in the answers map
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: QuestionKind,

    /// Text shown to the user (defaults to the name)
    #[serde(default)]
    pub message: Option<String>,

    #[serde(rename = "default", default)]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub choices: Vec<String>,
}

impl PromptQuestion {
    pub fn new(name: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            message: None,
            default_value: None,
            choices: Vec::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn choice(mut self, choice: impl Into<String>) -> Self {
        self.choices.push(choice.into());
        self
    }

    /// Message to display
    pub fn display_message(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.name)
    }
}

/// Content hash of a definition document, used to detect changes on reload
pub fn definition_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_definition_from_json() {
        let def = ModuleDefinition::from_value(json!({
            "kind": "command",
            "id": "build",
            "aliases": ["build", "b"],
            "description": "Build the project",
            "args": [{ "name": "target", "required": true }],
            "flags": [
                { "name": "release", "alias": "r", "type": "boolean" },
                { "name": "jobs", "aliases": ["j", "threads"], "type": "number", "default": 4 }
            ]
        }))
        .unwrap();

        assert_eq!(def.kind(), ModuleKind::Command);
        assert_eq!(def.id(), "build");
        assert_eq!(def.handler_name(), "build");

        let ModuleDefinition::Command(command) = def else {
            panic!("Expected command definition");
        };
        assert_eq!(command.spec.aliases, vec!["build", "b"]);
        assert_eq!(command.spec.args[0].name, "target");
        assert!(command.spec.args[0].required);
        assert_eq!(command.spec.flags[0].aliases, vec!["r"]);
        assert_eq!(command.spec.flags[0].value_type, ValueType::Boolean);
        assert_eq!(command.spec.flags[1].aliases, vec!["j", "threads"]);
        assert_eq!(command.spec.flags[1].default_value, Some(json!(4)));
    }

    #[test]
    fn test_default_wrapper_is_unwrapped() {
        let def = ModuleDefinition::from_value(json!({
            "default": { "default": { "kind": "module", "id": "core", "category": "Util" } }
        }))
        .unwrap();

        assert_eq!(def.kind(), ModuleKind::Module);
        assert_eq!(def.id(), "core");
        assert_eq!(def.category(), Some("Util"));
    }

    #[test]
    fn test_listener_definition_defaults() {
        let def = ModuleDefinition::from_value(json!({
            "kind": "listener",
            "id": "ready",
            "emitter": "cli",
            "event": "ready",
            "handler": "on-ready"
        }))
        .unwrap();

        let ModuleDefinition::Listener(listener) = &def else {
            panic!("Expected listener definition");
        };
        assert_eq!(listener.mode, ListenerMode::On);
        assert_eq!(def.handler_name(), "on-ready");

        let once = ModuleDefinition::from_value(json!({
            "kind": "listener", "id": "boot", "emitter": "cli", "event": "ready", "type": "once"
        }))
        .unwrap();
        let ModuleDefinition::Listener(listener) = once else {
            panic!("Expected listener definition");
        };
        assert_eq!(listener.mode, ListenerMode::Once);
    }

    #[test]
    fn test_find_skips_untagged_values() {
        assert!(ModuleDefinition::find(json!({ "theme": "dark" })).unwrap().is_none());
        assert!(ModuleDefinition::find(json!({ "default": { "theme": "dark" } }))
            .unwrap()
            .is_none());
        assert!(ModuleDefinition::find(json!([1, 2, 3])).unwrap().is_none());

        let wrapped = ModuleDefinition::find(json!({ "default": { "kind": "module", "id": "core" } }))
            .unwrap()
            .unwrap();
        assert_eq!(wrapped.id(), "core");
    }

    #[test]
    fn test_find_rejects_tagged_value_with_bad_fields() {
        assert!(ModuleDefinition::find(json!({ "kind": "module" })).is_err());
        assert!(ModuleDefinition::find(json!({ "kind": "widget", "id": "x" })).is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = ModuleDefinition::from_value(json!({ "kind": "widget", "id": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_msgpack_encoding_keeps_tag() {
        let def = ModuleDefinition::Module(BasicDefinition {
            id: "core".to_string(),
            category: None,
        });
        let bytes = def.to_msgpack().unwrap();
        let value: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "module");
        assert_eq!(value["id"], "core");
    }

    #[test]
    fn test_definition_hash_changes_with_content() {
        let a = definition_hash(br#"{"kind":"module","id":"a"}"#);
        let b = definition_hash(br#"{"kind":"module","id":"b"}"#);
        assert_ne!(a, b);
        assert_eq!(a, definition_hash(br#"{"kind":"module","id":"a"}"#));
    }
}
