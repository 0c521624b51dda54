//! Error types for the collaborators and for whole-file failures.

use crate::model::{ArgsAs, Diagnostic};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce the metadata of a unit.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no metadata for unit '{unit}'")]
    UnitNotFound { unit: String },

    #[error("failed to read metadata for unit '{unit}' from {}: {source}", path.display())]
    Read {
        unit: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata for unit '{unit}': {source}")]
    Malformed {
        unit: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to turn a schema into code.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("malformed schema: {0}")]
    Malformed(String),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("clause '{clause}' is not supported for type '{type_name}'")]
    UnsupportedClause { type_name: String, clause: String },

    #[error("invalid value for clause '{clause}': {reason}")]
    ClauseValue { clause: String, reason: String },

    #[error("return kind '{0}' is not supported")]
    ReturnKind(String),
}

/// A tag cannot be honoured for its function.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("unsupported metadata version {found} for sub '{function}' (only {supported} is supported)")]
    UnsupportedVersion {
        function: String,
        found: f64,
        supported: f64,
    },

    #[error("sub '{function}' packs its arguments as '{args_as}'; only 'hash' and 'hashref' are supported")]
    UnsupportedArgsAs { function: String, args_as: ArgsAs },

    #[error("argument '{argument}' is not declared in the metadata of sub '{function}'")]
    UnknownArgument { function: String, argument: String },

    #[error("argument '{argument}' of sub '{function}' has no schema")]
    MissingSchema { function: String, argument: String },

    #[error("{tag} needs a '{expected}' variable, found '{found}'")]
    WrongVarKind {
        tag: &'static str,
        expected: char,
        found: String,
    },

    #[error("VALIDATE_ARGS does not take an argument name (got '{0}')")]
    ExplicitNameOnAll(String),

    #[error("more than one VALIDATE_ARGS in sub '{0}'")]
    DuplicateAll(String),

    #[error("cannot compile schema for argument '{argument}': {source}")]
    Compile {
        argument: String,
        #[source]
        source: CompileError,
    },
}

/// A file could not be processed; its original text must be kept.
#[derive(Debug, Error)]
#[error("{fatal}")]
pub struct FileError {
    pub fatal: Diagnostic,
    /// Warnings and notices recorded before the abort
    pub diagnostics: Vec<Diagnostic>,
}
