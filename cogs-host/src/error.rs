//! Registry error types

use crate::discovery::DiscoveryError;
use crate::loader::LoaderError;
use cogs_api::ModuleKind;
use thiserror::Error;

/// Errors raised by registry operations
///
/// Construction and registration errors are returned to the caller. Errors
/// raised while a command runs are reported through the `error` event instead.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate identifier \"{id}\" in {kind} registry")]
    DuplicateIdentifier { kind: ModuleKind, id: String },

    #[error("Duplicate alias \"{alias}\" - id1: {id} - id2: {conflict}")]
    AliasConflict {
        alias: String,
        id: String,
        conflict: String,
    },

    #[error("Could not find module \"{id}\" in {kind} registry")]
    ModuleNotFound { kind: ModuleKind, id: String },

    #[error("Unable to reload module \"{id}\" in {kind} registry")]
    NotReloadable { kind: ModuleKind, id: String },

    #[error("No directory specified in {kind} registry")]
    NoDirectorySpecified { kind: ModuleKind },

    #[error("{kind}#exec is not implemented - id: {id}")]
    NoAbstractExec { kind: ModuleKind, id: String },

    #[error("Missing parameter {parameter} in {kind} - id: {id}")]
    MissingParameter {
        kind: ModuleKind,
        id: String,
        parameter: &'static str,
    },

    #[error("Value of '{name}' was not {expected}")]
    InvalidType {
        name: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl RegistryError {
    pub(crate) fn not_an_event_source(name: impl Into<String>) -> Self {
        RegistryError::InvalidType {
            name: name.into(),
            expected: "an event source",
        }
    }
}
