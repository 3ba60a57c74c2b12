//! Media Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, MediaError>;

/// Storage and preview errors
#[derive(Error, Debug)]
pub enum MediaError {
    /// PDF could not be parsed
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Image decode/encode failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl From<lopdf::Error> for MediaError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MediaError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
