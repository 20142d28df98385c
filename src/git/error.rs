//! git::error
//!
//! Error types at the engine boundary.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::TypeError;

/// A failure status reported by the engine.
///
/// Carried into a task's completion phase unchanged; the core never retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineError {
    /// Raw engine status code (negative)
    pub code: i32,
    /// Engine subsystem that reported the error, when known
    pub class: Option<String>,
    /// Captured engine message, when the engine set one
    pub message: Option<String>,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} (errno {})", message, self.code),
            None => write!(f, "engine error (errno {})", self.code),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<git2::Error> for EngineError {
    fn from(err: git2::Error) -> Self {
        let message = err.message().trim();
        let class = match err.class() {
            git2::ErrorClass::None => None,
            class => Some(format!("{:?}", class)),
        };
        Self {
            code: err.raw_code(),
            class,
            message: (!message.is_empty()).then(|| message.to_string()),
        }
    }
}

/// Errors from opening repositories and resolving objects on the host side.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// A revision or object id did not resolve.
    #[error("object not found: {spec}")]
    ObjectNotFound { spec: String },

    /// The object exists but is not of the requested kind.
    #[error("{spec} is not a {expected}")]
    WrongKind {
        spec: String,
        expected: &'static str,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid { oid: String },

    /// Any other engine failure.
    #[error("{context}: {source}")]
    Engine {
        context: String,
        #[source]
        source: EngineError,
    },
}

impl GitError {
    /// Classify a git2 error raised while working on `context`.
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                spec: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec | git2::ErrorCode::Ambiguous => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Engine {
                context: context.to_string(),
                source: err.into(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(oid) => GitError::InvalidOid { oid },
        }
    }
}
