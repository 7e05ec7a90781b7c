use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not extract folder ID from URL: {0}")]
    InvalidFolderUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no credentials configured: {0}")]
    Credentials(String),

    #[error("size mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("some {what} failed: {}", .messages.join("; "))]
    Partial {
        what: &'static str,
        messages: Vec<String>,
    },
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
