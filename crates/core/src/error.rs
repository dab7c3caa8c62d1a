use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path is not under the indexed root: {0}")]
    OutsideRoot(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("repository acquisition failed: {0}")]
    Repository(String),

    #[error("file is not valid utf-8 text: {0}")]
    NotText(String),

    #[error("file exceeds {limit} bytes: {path}")]
    TooLarge { path: String, limit: u64 },

    #[error(transparent)]
    Store(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding backend is not configured: {0}")]
    Configuration(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid local snapshot: {0}")]
    Snapshot(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector dimension {found} does not match store dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("search request failed: {0}")]
    Request(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
