//! Custom error types and result handling for Yomikomi operations.
//!
//! Only setup failures (configuration, output root creation, empty selection) travel
//! through [`Result<T>`] to the caller. Per-image, per-chapter and per-format failures are
//! absorbed where they happen and reported as data on the outcome types.
//!
use std::path::PathBuf;

/// Type alias for Results with Yomikomi errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Yomikomi operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image decoding errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// EPUB generation errors
    #[error(transparent)]
    Epub(#[from] epub_builder::Error),
    /// PDF layout and encoding errors
    #[error("PDF error: {0}")]
    Pdf(String),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// URL parsing errors
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::yomikomi::YomikomiConfigBuilderError),
    /// Non-success HTTP status for a URL
    #[error("Request to '{0}' returned status {1}")]
    HttpStatus(String, u16),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// No chapters or no images could be discovered on a page
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),
    /// The chapter selection was empty or could not be parsed
    #[error("Invalid chapter selection: {0}")]
    EmptySelection(String),
    /// Headless browser failures
    #[error("Browser error: {0}")]
    Browser(String),
    /// Error for failed asynchronous tasks
    #[error("Asynchronous task failed: {0}")]
    AsyncTaskError(String),
    /// Error for unsupported operations or formats (e.g., unknown image extension)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found (e.g., chapter directory)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
