use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document root does not exist: {0}")]
    MissingRoot(String),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("index build task failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("index unavailable: {0}")]
    Index(#[from] IngestError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
