//! Error and diagnostic types shared across the crate.
//!
//! Only [`LineageError`] aborts an operation. Everything the data can be
//! incomplete about (unparsable procedure code, dangling table ids, cycles)
//! is reported as a [`Diagnostic`] and reflected in the shape of the output.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::SettingsError;
use crate::index::IndexError;

/// Result type for fallible lineage operations.
pub type LineageResult<T> = Result<T, LineageError>;

/// The input documents a build may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Authoritative procedure → table dependency records.
    Dependencies,
    /// Procedure source text.
    Sources,
    /// Per-procedure input/output metadata.
    Metadata,
    /// Table id ↔ name master mapping.
    TableMaster,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Dependencies => write!(f, "dependency records"),
            InputKind::Sources => write!(f, "procedure sources"),
            InputKind::Metadata => write!(f, "procedure metadata"),
            InputKind::TableMaster => write!(f, "table master"),
        }
    }
}

/// Fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("Missing input file for {kind}: {}", path.display())]
    MissingInputFile { kind: InputKind, path: PathBuf },

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Index store error: {0}")]
    Index(#[from] IndexError),
}

impl LineageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LineageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A recoverable data-quality condition observed during a build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Code-derived edge extraction failed; the procedure keeps only its
    /// authoritative edges.
    UnparsableProcedureSource { procedure: String, message: String },

    /// Metadata named a table id absent from the master mapping. A
    /// placeholder origin table was synthesized under the raw reference.
    UnknownTableReference { procedure: String, reference: String },

    /// Resolution entered from `entry` revisited `table` while it was still
    /// in progress, and the cycle was broken there.
    CyclicDependency { entry: String, table: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnparsableProcedureSource { procedure, message } => {
                write!(f, "Could not parse source of '{}': {}", procedure, message)
            }
            Diagnostic::UnknownTableReference {
                procedure,
                reference,
            } => {
                write!(
                    f,
                    "Procedure '{}' references unknown table '{}'",
                    procedure, reference
                )
            }
            Diagnostic::CyclicDependency { entry, table } => {
                write!(
                    f,
                    "Cycle broken at '{}' while resolving '{}'",
                    table, entry
                )
            }
        }
    }
}
