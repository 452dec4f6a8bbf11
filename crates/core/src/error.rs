// Error taxonomy for the document store.
//
// `InvalidPath` and `Conflict` are client-correctable; `Backend` is fatal to
// the request; `Index` never escapes a write operation (logged and counted
// at the service boundary instead).

use thiserror::Error;
use vellum_common::path::PathError;

pub type Result<T> = std::result::Result<T, WikiError>;

#[derive(Debug, Error)]
pub enum WikiError {
    /// The path or revision does not exist in the repository.
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic-lock mismatch: the page changed since the caller's base
    /// revision. Carries the revision the page is at now so the caller can
    /// retry correctly.
    #[error("conflicting edit: page is now at revision {current_revision}")]
    Conflict { current_revision: String },

    /// Path validation failure, rejected before any I/O.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// Underlying repository failure (spawn error, non-zero git exit,
    /// disk problems). The message carries the failed command and stderr.
    #[error("repository backend failure: {0}")]
    Backend(String),

    /// Derived-index failure. Recovered at the write boundary; only read
    /// paths that go straight to the index surface this.
    #[error("index failure: {0}")]
    Index(String),
}

impl WikiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<crate::repo::GitError> for WikiError {
    fn from(error: crate::repo::GitError) -> Self {
        use crate::repo::GitError;
        match error {
            GitError::PathMissing { path } => WikiError::NotFound(path),
            GitError::BadRevision { revision } => {
                WikiError::NotFound(format!("revision {revision}"))
            }
            other => WikiError::Backend(other.to_string()),
        }
    }
}
