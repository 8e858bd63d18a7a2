//! Error types shared by the merge engine and the stripper.

use crate::archive::ManifestError;
use crate::classfile::ClassFormatError;
use crate::config::ConfigError;
use crate::merge::DuplicateReport;
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("duplicate files:\n{0}")]
    #[diagnostic(
        code(appjar::duplicate_entries),
        help("declare these paths as remove, concat, overwrite or equal patterns")
    )]
    DuplicateEntries(DuplicateReport),

    #[error("root not found: {root}")]
    #[diagnostic(code(appjar::root_not_found))]
    RootNotFound { root: String },

    #[error("unresolved symbol {symbol}, referenced from {referrer}")]
    #[diagnostic(
        code(appjar::unresolved_symbol),
        help("the archive is inconsistent: the symbol is missing from every class on its lookup path")
    )]
    UnresolvedSymbol { symbol: String, referrer: String },

    #[error("main class {main}: {reason}")]
    #[diagnostic(code(appjar::entry_point_missing))]
    EntryPointMissing { main: String, reason: String },

    #[error("{path}: not found")]
    #[diagnostic(code(appjar::not_found))]
    NotFound { path: String },

    #[error("{path}: already exists")]
    #[diagnostic(code(appjar::already_exists))]
    AlreadyExists { path: String },

    #[error("{path}: {source}")]
    #[diagnostic(code(appjar::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    #[diagnostic(code(appjar::archive))]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{path}: invalid class file: {source}")]
    #[diagnostic(code(appjar::class_format))]
    ClassFormat {
        path: String,
        #[source]
        source: ClassFormatError,
    },

    #[error("{path}: {message}")]
    #[diagnostic(code(appjar::registry))]
    Registry { path: String, message: String },

    #[error("{path}: invalid manifest: {source}")]
    #[diagnostic(code(appjar::manifest))]
    Manifest {
        path: String,
        #[source]
        source: ManifestError,
    },
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn class_format(path: impl Into<String>, source: ClassFormatError) -> Self {
        Error::ClassFormat {
            path: path.into(),
            source,
        }
    }
}
