use thiserror::Error;

/// Failures on the extraction/chunking side of the pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported content type: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse document '{name}': {reason}")]
    DocumentParse { name: String, reason: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

impl IngestError {
    pub fn document_parse(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::DocumentParse {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures from the embedding and vector-index collaborators.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),
}

impl IndexError {
    pub fn backend(backend: impl Into<String>, details: impl ToString) -> Self {
        Self::BackendResponse {
            backend: backend.into(),
            details: details.to_string(),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
