//! Error taxonomy for translation and job execution.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Represents the closed set of error kinds reported to the platform.
///
/// The string form of a kind is the `type` of the job error artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The error was caused by the job's inputs or configuration.
    AppError,
    /// The error was caused by the executable or the platform itself.
    AppInternalError,
}

impl ErrorKind {
    /// Gets the string form of the error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppError => "AppError",
            Self::AppInternalError => "AppInternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from translation or job execution.
#[derive(Error, Debug)]
pub enum Error {
    /// A JSON value did not have the shape its declared type predicts.
    #[error("malformed field: {0}")]
    MalformedField(String),

    /// An input document had fields that were never consumed.
    #[error(
        "input `{name}` has fields that do not map to any parameter: {}",
        .keys.join(", ")
    )]
    UnmappedInputs {
        /// The name of the input document.
        name: String,

        /// The unused keys, sorted.
        keys: Vec<String>,
    },

    /// A file reference could not be resolved to a platform file.
    #[error("invalid file reference `{reference}`: {reason}")]
    InvalidFileReference {
        /// The file reference.
        reference: String,

        /// The reason the reference is invalid.
        reason: String,
    },

    /// A configuration object contained keys outside of its allow-list.
    #[error(
        "unsupported keys in {context}: {}; supported keys are: {}",
        .keys.join(", "),
        .supported.join(", ")
    )]
    UnsupportedKeys {
        /// The configuration object that was checked.
        context: String,

        /// The offending keys.
        keys: Vec<String>,

        /// The supported keys.
        supported: Vec<String>,
    },

    /// A platform object lacked the required access level.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Mandatory executable or job metadata was missing.
    #[error("missing required metadata `{0}`")]
    MissingMetadata(String),

    /// A platform request failed.
    #[error("platform request failed")]
    Platform(#[source] anyhow::Error),

    /// An I/O error on a job artifact.
    #[error("failed to access `{}`", .path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An operation was attempted in the wrong job state.
    #[error("invalid job state: {0}")]
    InvalidState(String),

    /// The task panicked.
    #[error("the job panicked: {0}")]
    Panic(String),
}

impl Error {
    /// Creates a malformed field error for a value that does not match a
    /// type.
    pub(crate) fn mismatch(ty: impl fmt::Display, value: impl fmt::Display) -> Self {
        Self::MalformedField(format!("cannot deserialize value `{value}` to type `{ty}`"))
    }

    /// Gets the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedField(_)
            | Self::UnmappedInputs { .. }
            | Self::InvalidFileReference { .. }
            | Self::UnsupportedKeys { .. }
            | Self::Permission(_) => ErrorKind::AppError,
            Self::MissingMetadata(_)
            | Self::Platform(_)
            | Self::Io { .. }
            | Self::Json(_)
            | Self::InvalidState(_)
            | Self::Panic(_) => ErrorKind::AppInternalError,
        }
    }
}

/// A [`Result`](std::result::Result) with an [`Error`](enum@self::Error).
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(
            Error::MalformedField("x".into()).kind(),
            ErrorKind::AppError
        );
        assert_eq!(
            Error::Permission("project-1".into()).kind(),
            ErrorKind::AppError
        );
        assert_eq!(
            Error::MissingMetadata("sourceCode".into()).kind(),
            ErrorKind::AppInternalError
        );
        assert_eq!(
            Error::Panic("index out of bounds".into()).kind(),
            ErrorKind::AppInternalError
        );
        assert_eq!(ErrorKind::AppInternalError.to_string(), "AppInternalError");
    }

    #[test]
    fn unsupported_keys_message() {
        let e = Error::UnsupportedKeys {
            context: "extras".into(),
            keys: vec!["foo".into()],
            supported: vec!["bar".into(), "baz".into()],
        };
        assert_eq!(
            e.to_string(),
            "unsupported keys in extras: foo; supported keys are: bar, baz"
        );
    }
}
