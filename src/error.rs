//! Error types for the screenshot service

use thiserror::Error;

/// Result type alias for rendering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a screenshot request
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied no markup (or only whitespace)
    #[error("HTML/CSS code is required")]
    EmptyMarkup,

    /// Rendering options failed bounds validation
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Failed to launch the browser session
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Content did not settle before the deadline
    #[error("Content loading timed out after {0}ms")]
    Timeout(u64),

    /// The page failed to load the supplied markup
    #[error("Content failed to load: {0}")]
    InvalidContent(String),

    /// Screenshot capture failed
    #[error("Screenshot capture failed: {0}")]
    Capture(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is the caller's fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::EmptyMarkup | Error::InvalidOptions(_))
    }
}
