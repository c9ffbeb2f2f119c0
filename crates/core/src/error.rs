use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or unexpected protocol frame. Recovered locally: the
    /// adapter answers with an error response and keeps serving.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP response (or network failure, status 0) from the
    /// shared backend.
    #[error("Backend error (status {status}): {body}")]
    Backend { status: u16, body: String },

    /// Failure inside a tool or task handler. Converted to an error
    /// content block at the protocol boundary, never a transport failure.
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a backend error for a failure that never produced an HTTP
    /// status (connection refused, DNS, timeout).
    pub fn backend_unreachable(err: impl std::fmt::Display) -> Self {
        Error::Backend {
            status: 0,
            body: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
