//! Error types for the video output pipeline.

use std::path::PathBuf;

/// Top-level error type for video output operations.
///
/// Scope of each variant:
/// - `Init`: unrecoverable, the display must not be used
/// - `Upload`, `Dispatch`, `Submit`: contained within a single frame
/// - `ResourceLoad`: the previously loaded resource is kept
/// - `UnsupportedRequest`: control request rejected, no state change
#[derive(Debug, thiserror::Error)]
pub enum VoutError {
    #[error("Initialization failed: {message}")]
    Init { message: String },

    #[error("Failed uploading plane {plane}: {message}")]
    Upload { plane: usize, message: String },

    #[error("Failed rendering frame: {message}")]
    Dispatch { message: String },

    #[error("Failed submitting frame: {message}")]
    Submit { message: String },

    #[error("Failed loading {kind} from {}: {message}", .path.display())]
    ResourceLoad {
        kind: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Unsupported control request: {request}")]
    UnsupportedRequest { request: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using `VoutError`.
pub type VoutResult<T> = Result<T, VoutError>;

impl VoutError {
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init {
            message: msg.into(),
        }
    }

    pub fn upload(plane: usize, msg: impl Into<String>) -> Self {
        Self::Upload {
            plane,
            message: msg.into(),
        }
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch {
            message: msg.into(),
        }
    }

    pub fn submit(msg: impl Into<String>) -> Self {
        Self::Submit {
            message: msg.into(),
        }
    }

    pub fn unsupported(request: impl Into<String>) -> Self {
        Self::UnsupportedRequest {
            request: request.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Returns `true` for errors that only affect the current frame.
    pub fn is_frame_scoped(&self) -> bool {
        matches!(
            self,
            Self::Upload { .. } | Self::Dispatch { .. } | Self::Submit { .. }
        )
    }
}

/// Failure reported by a rendering backend.
///
/// Backends are opaque; the pipeline only needs a human-readable reason and
/// maps the failure onto the `VoutError` variant of the calling stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_scoped_classification() {
        assert!(VoutError::upload(1, "x").is_frame_scoped());
        assert!(VoutError::dispatch("x").is_frame_scoped());
        assert!(VoutError::submit("x").is_frame_scoped());
        assert!(!VoutError::init("x").is_frame_scoped());
        assert!(!VoutError::unsupported("x").is_frame_scoped());
    }

    #[test]
    fn messages_name_the_failing_part() {
        let err = VoutError::upload(2, "allocation failed");
        assert_eq!(err.to_string(), "Failed uploading plane 2: allocation failed");

        let err = VoutError::ResourceLoad {
            kind: "lookup table",
            path: PathBuf::from("/tmp/a.cube"),
            message: "parse error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed loading lookup table from /tmp/a.cube: parse error"
        );
    }

    #[test]
    fn backend_error_from_anyhow_keeps_context_chain() {
        let err = anyhow::anyhow!("root cause").context("creating device");
        let be = BackendError::from(err);
        assert_eq!(be.message, "creating device: root cause");
    }
}
