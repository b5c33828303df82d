//! Error types for line ingest and flow simulation.

/// Result type for line-directory loading
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for simulation and holiday lookups
pub type FlowResult<T> = Result<T, FlowError>;

/// Failure while obtaining the line directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Line directory is empty")]
    Empty,
}

/// Failure inside the simulator or one of its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Service returned status {0}")]
    ServiceStatus(i64),

    #[error("Invalid special event: {0}")]
    InvalidEvent(String),

    #[error("Unknown line: {0}")]
    UnknownLine(i64),
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::MalformedResponse(e.to_string())
    }
}
