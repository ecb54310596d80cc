use serde::Serialize;

/// Error raised by a persistence collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Required run parameter missing or out of bounds. Raised before any I/O.
    Validation(&'static str),
    /// No desk matches the request.
    NotFound(String),
    /// A read from the store failed; the run aborted before mutating anything.
    Fetch(String),
    /// A single write failed. Localized to one commit inside a run.
    Write(String),
    /// The audit record could not be stored.
    PersistSummary(String),
}

impl EngineError {
    /// HTTP-equivalent status for callers that surface runs over a web API.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(_) => 400,
            EngineError::NotFound(_) => 404,
            EngineError::Fetch(_) | EngineError::Write(_) | EngineError::PersistSummary(_) => 500,
        }
    }

    pub fn response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::NotFound(msg) => write!(f, "{msg}"),
            EngineError::Fetch(e) => write!(f, "fetch failed: {e}"),
            EngineError::Write(e) => write!(f, "write failed: {e}"),
            EngineError::PersistSummary(e) => write!(f, "failed to persist run summary: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Fetch(e.0)
    }
}

/// `{error}` body returned when a run aborts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
