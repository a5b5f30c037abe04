//! Error types for canvas cutout operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for canvas cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error kinds produced by the pipeline, the I/O services and the batch runner
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors without a more specific classification
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source bytes could not be decoded; the whole source is skipped
    #[error("Failed to decode '{}': {reason}", .path.display())]
    DecodeFailure { path: PathBuf, reason: String },

    /// Crop rectangle or canvas geometry violates the pipeline contract
    #[error("Geometry error: {0}")]
    GeometryError(String),

    /// Output codec rejected the canvas buffer
    #[error("Failed to encode '{}': {reason}", .path.display())]
    EncodeFailure { path: PathBuf, reason: String },

    /// Filesystem refused the encoded output
    #[error("Failed to write '{}': {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input directory could not be listed; fatal for the whole run
    #[error("Failed to enumerate input directory '{}': {reason}", .path.display())]
    Enumeration { path: PathBuf, reason: String },

    /// The batch stopped early after a fatal resource error
    #[error("Batch aborted: {0}")]
    Aborted(String),
}

impl CutoutError {
    /// Create a new decode failure for a source path
    pub fn decode_failure<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::DecodeFailure {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new geometry error
    pub fn geometry<S: Into<String>>(msg: S) -> Self {
        Self::GeometryError(msg.into())
    }

    /// Create a new encode failure for an output path
    pub fn encode_failure<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::EncodeFailure {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new write failure for an output path
    pub fn write_failure<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new enumeration error
    pub fn enumeration<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::Enumeration {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether this error should stop every remaining queued item of a batch.
    ///
    /// Only resource exhaustion on the output side qualifies; decode, geometry
    /// and ordinary write errors stay local to their work item.
    pub fn is_fatal_resource_error(&self) -> bool {
        match self {
            Self::WriteFailure { source, .. } | Self::Io(source) => {
                matches!(
                    source.kind(),
                    std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded
                )
            },
            _ => false,
        }
    }
}
