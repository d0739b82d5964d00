//! Error types for regionstyle.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the regionstyle library.
///
/// Every variant aborts the pipeline call that produced it; nothing in the
/// library retries or suppresses a partial result.
#[derive(Error, Debug)]
pub enum Error {
    /// A required field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced source image or mask artifact does not exist.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Image and mask extents cannot be reconciled.
    #[error("extent mismatch: {0}")]
    ResourceMismatch(String),

    /// A style backend or the segmentation model failed to load.
    #[error("backend {name} unavailable: {reason}")]
    BackendUnavailable { name: String, reason: String },

    /// A session transition was requested from the wrong state.
    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Model inference failed.
    #[error("inference failed in {stage}: {reason}")]
    Inference { stage: &'static str, reason: String },

    /// Failed to decode an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Configuration file could not be parsed or is inconsistent.
    #[error("invalid config: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::ResourceMismatch(msg.into())
    }

    pub fn inference(stage: &'static str, reason: impl ToString) -> Self {
        Self::Inference {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn unavailable(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::BackendUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for regionstyle operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_resource() {
        let err = Error::NotFound {
            path: PathBuf::from("uploads/cat.png"),
        };
        assert_eq!(err.to_string(), "not found: uploads/cat.png");

        let err = Error::unavailable("hayao", "missing input `input.1`");
        assert_eq!(
            err.to_string(),
            "backend hayao unavailable: missing input `input.1`"
        );
    }

    #[test]
    fn transition_error_mentions_state() {
        let err = Error::InvalidTransition {
            action: "select",
            state: "idle",
        };
        assert_eq!(err.to_string(), "cannot select while session is idle");
    }
}
