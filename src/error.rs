//! Error types for schema normalization and document loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors during normalization.
///
/// Reference failures and merge conflicts are not errors; they report through
/// the option callbacks and the pass continues. Only structurally unusable
/// input or exhausted recursion fails the call.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("cannot normalize {actual}: top-level value must be an object")]
    InvalidDocument { actual: String },

    #[error("recursion depth {limit} exceeded at {path}")]
    DepthExceeded { limit: usize, path: String },

    #[error("no node at pointer {pointer:?}")]
    UnknownPointer { pointer: String },
}

impl NormalizeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidDocument { .. }
            | Self::DepthExceeded { .. }
            | Self::UnknownPointer { .. } => 2,
        }
    }
}

/// Errors during document loading.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("missing.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidJson {
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn normalize_error_exit_codes() {
        let err = NormalizeError::InvalidDocument {
            actual: "array".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = NormalizeError::DepthExceeded {
            limit: 512,
            path: "/a/b".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn normalize_error_messages() {
        let err = NormalizeError::InvalidDocument {
            actual: "string".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot normalize string: top-level value must be an object"
        );
    }
}
