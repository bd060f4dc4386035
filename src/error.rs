//! Custom error types for the application.
//!
//! `SonarError` is the primary error type of the crate, built with `thiserror`.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type
//!   mismatches in `config/sonar.toml` or `SONAR_` environment variables.
//! - **`Configuration`**: Semantic errors that pass parsing but are logically
//!   invalid (e.g. a zero rate window). Caught during validation.
//! - **`SourceRead`** / **`SourceClosed`**: The byte source failed or reached
//!   end-of-stream. Both are fatal to the acquisition task.
//! - **`SerialOpen`**: The serial port could not be opened.
//! - **`TaskJoin`**: A spawned task panicked or was aborted.
//!
//! Malformed protocol frames are deliberately absent: the frame parser absorbs
//! them and resynchronises, so they never reach callers.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, SonarError>;

/// Errors raised by configuration, I/O and task management.
#[derive(Error, Debug)]
pub enum SonarError {
    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The byte source reported an I/O error.
    #[error("Byte source read failed: {0}")]
    SourceRead(std::io::Error),

    /// The byte source reached end-of-stream.
    #[error("Byte source closed")]
    SourceClosed,

    /// The serial port could not be opened.
    #[error("Failed to open serial port {0}")]
    SerialOpen(String),

    /// A spawned task panicked or was aborted.
    #[error("Task failed: {0}")]
    TaskJoin(String),
}

impl SonarError {
    /// True for errors that stop acquisition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SonarError::SourceRead(_) | SonarError::SourceClosed | SonarError::TaskJoin(_)
        )
    }

    /// Classify an I/O error coming from a byte source.
    pub fn from_source(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            SonarError::SourceClosed
        } else {
            SonarError::SourceRead(err)
        }
    }
}

impl From<figment::Error> for SonarError {
    fn from(err: figment::Error) -> Self {
        SonarError::Config(Box::new(err))
    }
}
