//! Argument parsing for command dispatch
//!
//! Dispatch only needs `parse(command, argv) -> {args, flags}`. The default
//! [`ClapParser`] translates a command's declarative schema into a
//! `clap::Command` and reads the matches back as JSON values.

use crate::command::Command;
use crate::module::Module;
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches};
use cogs_api::ValueType;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Errors produced while parsing an argument vector
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Invalid(String),

    #[error("Failed to read argument '{name}': {reason}")]
    Extract { name: String, reason: String },
}

/// Structured parse result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    pub args: Map<String, Value>,
    pub flags: Map<String, Value>,
}

/// Parses the tokens following the command token
#[async_trait]
pub trait ArgParser: Send + Sync {
    async fn parse(&self, command: &Command, argv: &[String]) -> Result<ParsedArgs, ParseError>;
}

/// Schema-driven parser backed by clap
#[derive(Debug, Clone, Copy, Default)]
pub struct ClapParser;

impl ClapParser {
    pub fn new() -> Self {
        Self
    }

    /// Check that a command's schema can be turned into a clap command
    ///
    /// Schemas come from definition files, and clap rejects malformed ones
    /// by panicking, so every rule clap asserts on is checked here first.
    pub fn validate(command: &Command) -> Result<(), ParseError> {
        let invalid = |reason: String| {
            Err(ParseError::Invalid(format!(
                "Invalid schema for command '{}': {}",
                command.id(),
                reason
            )))
        };

        let mut ids = HashSet::new();
        let mut optional_before: Option<&str> = None;
        for spec in command.args() {
            if spec.name.is_empty() {
                return invalid("positional argument with an empty name".to_string());
            }
            if !ids.insert(spec.name.as_str()) {
                return invalid(format!("'{}' is declared more than once", spec.name));
            }
            if is_required(spec.required, spec.default_value.as_ref()) {
                if let Some(optional) = optional_before {
                    return invalid(format!(
                        "required argument '{}' follows optional argument '{}'",
                        spec.name, optional
                    ));
                }
            } else if optional_before.is_none() {
                optional_before = Some(spec.name.as_str());
            }
        }

        let mut longs = HashSet::new();
        let mut shorts = HashSet::new();
        for spec in command.flags() {
            if !ids.insert(spec.name.as_str()) {
                return invalid(format!("'{}' is declared more than once", spec.name));
            }
            let long = spec.name.trim_start_matches('-');
            if long.is_empty() {
                return invalid(format!("flag '{}' has no usable long name", spec.name));
            }
            if !longs.insert(long) {
                return invalid(format!("'--{}' is used by more than one flag", long));
            }
            for alias in &spec.aliases {
                let alias = alias.trim_start_matches('-');
                let mut chars = alias.chars();
                match (chars.next(), chars.next()) {
                    (Some(short), None) => {
                        if !shorts.insert(short) {
                            return invalid(format!("'-{}' is used by more than one flag", short));
                        }
                    }
                    (Some(_), Some(_)) => {
                        if !longs.insert(alias) {
                            return invalid(format!("'--{}' is used by more than one flag", alias));
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Build the clap command for a command's schema
    pub fn build(command: &Command) -> Result<clap::Command, ParseError> {
        Self::validate(command)?;

        // A declared `-h`/`--help` flag replaces clap's own.
        let claims_help = command.flags().iter().any(|flag| {
            std::iter::once(&flag.name)
                .chain(&flag.aliases)
                .any(|name| matches!(name.trim_start_matches('-'), "h" | "help"))
        });

        let mut cmd = clap::Command::new(command.id().to_string())
            .no_binary_name(true)
            .disable_version_flag(true)
            .disable_help_flag(claims_help);
        if let Some(about) = command.description() {
            cmd = cmd.about(about.to_string());
        }

        for (position, spec) in command.args().iter().enumerate() {
            let mut arg = Arg::new(spec.name.clone())
                .index(position + 1)
                .required(is_required(spec.required, spec.default_value.as_ref()))
                .help(spec.help.clone())
                .action(ArgAction::Set);
            arg = match spec.value_type {
                ValueType::String => arg,
                ValueType::Number => arg.value_parser(value_parser!(f64)),
                ValueType::Boolean => arg.value_parser(value_parser!(bool)),
            };
            if let Some(default) = &spec.default_value {
                arg = arg.default_value(default_string(default));
            }
            cmd = cmd.arg(arg);
        }

        for spec in command.flags() {
            let takes_default = spec.value_type != ValueType::Boolean;
            let mut arg = Arg::new(spec.name.clone())
                .long(spec.name.trim_start_matches('-').to_string())
                .required(spec.required && !(takes_default && spec.default_value.is_some()))
                .help(spec.help.clone());

            let mut has_short = false;
            for alias in &spec.aliases {
                let alias = alias.trim_start_matches('-');
                let mut chars = alias.chars();
                match (chars.next(), chars.next()) {
                    (Some(short), None) if has_short => arg = arg.visible_short_alias(short),
                    (Some(short), None) => {
                        arg = arg.short(short);
                        has_short = true;
                    }
                    (Some(_), Some(_)) => arg = arg.visible_alias(alias.to_string()),
                    _ => {}
                }
            }

            arg = match spec.value_type {
                ValueType::Boolean => arg.action(ArgAction::SetTrue),
                ValueType::Number => arg.action(ArgAction::Set).value_parser(value_parser!(f64)),
                ValueType::String => arg.action(ArgAction::Set),
            };
            if takes_default {
                if let Some(default) = &spec.default_value {
                    arg = arg.default_value(default_string(default));
                }
            }
            cmd = cmd.arg(arg);
        }

        Ok(cmd)
    }

    /// Parse synchronously
    pub fn parse_args(&self, command: &Command, argv: &[String]) -> Result<ParsedArgs, ParseError> {
        let matches = Self::build(command)?
            .try_get_matches_from(argv)
            .map_err(|e| ParseError::Invalid(e.to_string()))?;

        let mut parsed = ParsedArgs::default();
        for spec in command.args() {
            let value = extract(&matches, &spec.name, spec.value_type)?;
            parsed.args.insert(spec.name.clone(), value);
        }
        for spec in command.flags() {
            let value = extract(&matches, &spec.name, spec.value_type)?;
            parsed.flags.insert(spec.name.clone(), value);
        }
        Ok(parsed)
    }
}

#[async_trait]
impl ArgParser for ClapParser {
    async fn parse(&self, command: &Command, argv: &[String]) -> Result<ParsedArgs, ParseError> {
        self.parse_args(command, argv)
    }
}

/// A default value satisfies a required argument
fn is_required(required: bool, default: Option<&Value>) -> bool {
    required && default.is_none()
}

fn default_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract(matches: &ArgMatches, name: &str, value_type: ValueType) -> Result<Value, ParseError> {
    let found = match value_type {
        ValueType::Boolean => matches
            .try_get_one::<bool>(name)
            .map(|v| v.map(|b| Value::Bool(*b))),
        ValueType::Number => matches
            .try_get_one::<f64>(name)
            .map(|v| v.and_then(|n| Number::from_f64(*n)).map(Value::Number)),
        ValueType::String => matches
            .try_get_one::<String>(name)
            .map(|v| v.map(|s| Value::String(s.clone()))),
    };

    found
        .map(|value| value.unwrap_or(Value::Null))
        .map_err(|e| ParseError::Extract {
            name: name.to_string(),
            reason: e.to_string(),
        })
}
