//! Error types for filer-core
//!
//! Provides a unified error type shared by every backend and the manager.
//! Each variant maps to a CLI exit code.

use std::io::ErrorKind;

use thiserror::Error;

use crate::uri::Uri;

/// Result type alias for filer-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for filer operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed resource locator
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Scheme is syntactically valid but no backend is registered for it.
    /// Carries the parsed URI for diagnostics.
    #[error("Unknown scheme '{}' in {}", .0.scheme(), .0)]
    UnknownScheme(Uri),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Non-recursive operation on a directory that has content
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Destination is the source itself or lies inside it
    #[error("Cannot copy {src} into itself: {dst}")]
    Overlap { src: String, dst: String },

    /// Backend session could not be established
    #[error("Failed to connect {} backend: {source}", scheme_label(.scheme))]
    Connect {
        scheme: String,
        #[source]
        source: Box<Error>,
    },

    /// Backend session could not be torn down
    #[error("Failed to disconnect {} backend: {source}", scheme_label(.scheme))]
    Disconnect {
        scheme: String,
        #[source]
        source: Box<Error>,
    },

    /// Enumeration failure while traversing a tree
    #[error("Error walking the path: {0}")]
    Walk(String),

    /// Filesystem error that has no semantic match, with operation context
    #[error("Failed to {op} {path}: {source}")]
    Fs {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote request failed
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication or authorization failure
    #[error("Access denied: {0}")]
    Auth(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// General error
    #[error("{0}")]
    General(String),
}

fn scheme_label(scheme: &str) -> &str {
    if scheme.is_empty() { "local" } else { scheme }
}

impl Error {
    /// Map an OS error onto the taxonomy.
    ///
    /// Errors with a semantic match become `NotFound`, `AlreadyExists` or
    /// `DirectoryNotEmpty`; everything else is kept as `Fs` with the
    /// operation and path attached.
    pub fn from_io(source: std::io::Error, op: &'static str, path: impl Into<String>) -> Self {
        let path = path.into();
        match source.kind() {
            ErrorKind::NotFound => Error::NotFound(path),
            ErrorKind::AlreadyExists => Error::AlreadyExists(path),
            ErrorKind::DirectoryNotEmpty => Error::DirectoryNotEmpty(path),
            _ => Error::Fs { op, path, source },
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidUri(_) | Error::UnknownScheme(_) => 2, // UsageError
            Error::Config(_) | Error::TomlParse(_) | Error::InvalidUrl(_) => 2,
            Error::Overlap { .. } => 2,
            // A backend rejecting its configuration is still a usage problem
            Error::Connect { source, .. }
                if matches!(**source, Error::Config(_) | Error::InvalidUrl(_)) =>
            {
                2
            }
            Error::Network(_) | Error::Connect { .. } | Error::Disconnect { .. } => 3,
            Error::Auth(_) => 4,
            Error::Fs { source, .. } if source.kind() == ErrorKind::PermissionDenied => 4,
            Error::NotFound(_) => 5,
            Error::AlreadyExists(_) | Error::DirectoryNotEmpty(_) => 6, // Conflict
            _ => 1,
        }
    }

    /// Whether this error (or the error it wraps) is a `NotFound`
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Connect { source, .. } | Error::Disconnect { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }
}
