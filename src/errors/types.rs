//! Error type definitions for the Mandelbrot render service

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Render parameters failed validation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Heavy render worker errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// PNG encoding failures
    #[error("Encode error: {0}")]
    Encode(#[from] image::ImageError),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Render parameter validation errors
///
/// The display strings are returned verbatim to clients as `400: <message>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Coordinate missing, unparsable or not finite
    #[error("failed to parse {field}")]
    InvalidCoordinate { field: &'static str },

    /// Coordinate outside [-2.0, 2.0]
    #[error("{field} must be between -2.0 and 2.0")]
    OutOfRange { field: &'static str },

    /// Zoom missing or not a non-negative integer
    #[error("invalid zoom")]
    InvalidZoom,

    /// Zoom below 1
    #[error("zoom must be at least 1")]
    ZoomTooSmall,

    /// Resolution not one of small, medium, big, ultra
    #[error("invalid res")]
    UnknownResolution,
}

impl ValidationError {
    /// Name of the request parameter that failed validation
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidCoordinate { field } | Self::OutOfRange { field } => field,
            Self::InvalidZoom | Self::ZoomTooSmall => "zoom",
            Self::UnknownResolution => "res",
        }
    }
}

/// Disk cache errors
///
/// These never reach a client; the cache store logs them and degrades to a
/// miss (reads) or a skipped write (writes).
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to read cache entry {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write cache entry {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to measure cache directory {path:?}: {source}")]
    Usage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache quota exceeded: {used} bytes used (max: {quota})")]
    QuotaExceeded { used: u64, quota: u64 },

    #[error("failed to create cache directory under {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Heavy render worker errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The worker has shut down or dropped the job before completing it
    #[error("heavy render worker is not running")]
    WorkerStopped,
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the client
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_the_field() {
        let err = ValidationError::OutOfRange { field: "x" };
        assert_eq!(err.to_string(), "x must be between -2.0 and 2.0");
        assert_eq!(err.field(), "x");

        let err = ValidationError::InvalidCoordinate { field: "y" };
        assert_eq!(err.to_string(), "failed to parse y");
        assert_eq!(ValidationError::InvalidZoom.field(), "zoom");
        assert_eq!(ValidationError::UnknownResolution.field(), "res");
    }

    #[test]
    fn test_app_error_passes_validation_message_through() {
        let err: AppError = ValidationError::InvalidZoom.into();
        assert_eq!(err.to_string(), "invalid zoom");
        assert!(err.is_client_error());

        let err: AppError = SchedulerError::WorkerStopped.into();
        assert!(!err.is_client_error());
    }
}
