use shelfmatch_core::ErrorCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by index build, search, and persistence.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("index has not been built")]
    NotReady,

    #[error("persisted index at {} is corrupt: {reason}", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("persisted index file {} not found", path.display())]
    IndexMissing { path: PathBuf },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot build an index over an empty corpus")]
    EmptyCorpus,

    #[error("semantic and lexical indices were built from different catalogs ({detail})")]
    IdUniverseMismatch { detail: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("index io failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SearchError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn embedding(err: &anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }

    /// Stable machine code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotReady => ErrorCode::IndexNotReady,
            Self::IndexCorrupt { .. } => ErrorCode::IndexCorrupt,
            Self::IndexMissing { .. } => ErrorCode::IndexMissing,
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::EmptyCorpus => ErrorCode::EmptyCorpus,
            Self::IdUniverseMismatch { .. } => ErrorCode::IdUniverseMismatch,
            Self::Embedding(_) => ErrorCode::EmbeddingFailed,
            Self::Io { .. } => ErrorCode::InternalUnexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variants() {
        assert_eq!(SearchError::NotReady.error_code(), ErrorCode::IndexNotReady);
        assert_eq!(
            SearchError::corrupt("models/vectors.bin", "bad magic").error_code(),
            ErrorCode::IndexCorrupt
        );
        assert_eq!(
            SearchError::DimensionMismatch {
                expected: 384,
                actual: 256
            }
            .error_code(),
            ErrorCode::DimensionMismatch
        );
    }

    #[test]
    fn corrupt_message_names_path_and_reason() {
        let err = SearchError::corrupt("models/vectors.bin", "digest mismatch");
        let msg = err.to_string();
        assert!(msg.contains("models/vectors.bin"));
        assert!(msg.contains("digest mismatch"));
    }
}
