use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which model call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStage {
    Embedding,
    Reranking,
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStage::Embedding => f.write_str("embedding"),
            ModelStage::Reranking => f.write_str("reranking"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{stage} model call failed: {source}")]
    ModelInvocation {
        stage: ModelStage,
        #[source]
        source: BoxError,
    },

    #[error("Malformed cache at {}: {reason}", path.display())]
    MalformedCache { path: PathBuf, reason: String },

    #[error("Index operation failed: {0}")]
    Index(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn model(stage: ModelStage, err: anyhow::Error) -> Self {
        Error::ModelInvocation { stage, source: err.into() }
    }

    pub fn index(err: anyhow::Error) -> Self {
        Error::Index(format!("{err:#}"))
    }

    pub fn malformed_cache(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MalformedCache { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
