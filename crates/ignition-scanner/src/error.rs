//! Error types for the Ignition scanner

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type for scanner operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur during scanning
#[derive(Error, Debug)]
pub enum ScanError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Directory walk failed
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// A resource type descriptor is unusable
    #[error("Invalid resource type descriptor: {0}")]
    InvalidDescriptor(String),

    /// Project path does not exist
    #[error("Project path does not exist: {}", .0.display())]
    ProjectNotFound(PathBuf),

    /// Project path is not a directory
    #[error("Project path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File watcher could not be set up
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Background scan task did not finish
    #[error("Scan task failed: {0}")]
    Task(String),

    /// Failure observed through a scan shared with other callers
    #[error("{0}")]
    Shared(Arc<ScanError>),
}

impl ScanError {
    /// Unwrap an error received from a shared in-flight scan.
    ///
    /// The sole owner gets the original error back; otherwise the shared
    /// handle is kept so every caller sees the same failure.
    pub(crate) fn from_shared(err: Arc<ScanError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(ScanError::Shared)
    }

    /// The underlying error, looking through shared wrappers
    pub fn root(&self) -> &ScanError {
        match self {
            ScanError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Whether this error means the requested project path is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ScanError::ProjectNotFound(_))
    }
}
