//! Common error types for hostanon.

use std::path::PathBuf;
use thiserror::Error;

/// Common error type for hostanon operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Corpus '{kind}' is empty")]
    EmptyCorpus { kind: String },

    #[error("Invalid corpus '{kind}' at line {line}: {reason}")]
    InvalidCorpus {
        kind: String,
        line: usize,
        reason: String,
    },

    #[error("Cannot read corpus '{kind}' from {path}: {source}")]
    CorpusRead {
        kind: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Checksum mismatch for corpus '{kind}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        kind: String,
        expected: String,
        actual: String,
    },

    #[error("Rule '{rule}' references corpus '{kind}' which is not loaded")]
    MissingCorpus { rule: String, kind: String },

    #[error("Invalid path '{path}': {reason}")]
    PathSyntax { path: String, reason: String },

    #[error("Cannot determine schema version of document; pass an explicit version")]
    UnknownSchemaVersion,

    #[error("Unsupported schema version: {0}")]
    UnsupportedSchemaVersion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

impl Error {
    /// True for errors that invalidate the whole run rather than one document.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::EmptyCorpus { .. }
                | Error::InvalidCorpus { .. }
                | Error::CorpusRead { .. }
                | Error::ChecksumMismatch { .. }
                | Error::MissingCorpus { .. }
                | Error::PathSyntax { .. }
                | Error::Config(_)
                | Error::Yaml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(Error::EmptyCorpus {
            kind: "host".into()
        }
        .is_configuration());
        assert!(Error::PathSyntax {
            path: "a..b".into(),
            reason: "empty key".into()
        }
        .is_configuration());
        assert!(!Error::UnknownSchemaVersion.is_configuration());
        assert!(!Error::UnsupportedSchemaVersion("7".into()).is_configuration());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::MissingCorpus {
            rule: "Hostname".into(),
            kind: "host".into(),
        };
        assert_eq!(
            err.to_string(),
            "Rule 'Hostname' references corpus 'host' which is not loaded"
        );
    }
}
