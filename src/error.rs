use std::path::PathBuf;

use crate::semantic::{BundleError, EmbeddingError, IndexError};

/// Errors surfaced by the recommender engine.
///
/// A query either returns a complete ranked list or one of these; partial
/// results are never produced.
#[derive(thiserror::Error, Debug)]
pub enum RecommendError {
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("catalog has no items with a synopsis")]
    EmptyCatalog,

    #[error("bundle is corrupt: {0}")]
    CorruptBundle(String),

    #[error("bundle artifact not found: {}", .0.display())]
    BundleNotFound(PathBuf),

    #[error("anime '{0}' not found")]
    TitleNotFound(String),

    #[error("anime '{0}' has no synopsis and is not indexed")]
    ItemNotIndexed(String),

    #[error("query text is empty")]
    EmptyQuery,

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(#[from] EmbeddingError),

    #[error("bundle was built with a different embedding model than '{0}'")]
    ModelMismatch(String),

    #[error("engine has no index loaded")]
    NotReady,

    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecommendError {
    /// Whether the failure was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TitleNotFound(_)
                | Self::ItemNotIndexed(_)
                | Self::EmptyQuery
                | Self::Index(IndexError::InvalidLimit)
        )
    }
}

impl From<BundleError> for RecommendError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::Missing(path) => Self::BundleNotFound(path),
            BundleError::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::CorruptBundle("index file truncated".to_string())
            }
            BundleError::Io(err) => Self::Io(err),
            err @ (BundleError::Csv(_)
            | BundleError::InvalidFormat(_)
            | BundleError::VersionMismatch(..)
            | BundleError::ChecksumMismatch(_)) => Self::CorruptBundle(err.to_string()),
        }
    }
}

pub type RecommendResult<T> = Result<T, RecommendError>;
