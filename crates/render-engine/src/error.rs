//! Export failures.

use stage_common::error::StageError;
use stage_design_model::DesignError;

/// Everything that can end an export without a result.
///
/// `ImageLoadFailure` is the only recoverable variant: the pipeline logs it
/// and keeps going without the asset. All others are terminal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    #[error("Export target not found: {target}")]
    MissingTargetElement { target: String },

    #[error("No render stage attached to the export request")]
    MissingRenderStage,

    #[error("Failed to load image {reference}: {reason}")]
    ImageLoadFailure { reference: String, reason: String },

    #[error("Cannot allocate a {width}x{height} drawing surface: {reason}")]
    CanvasContextUnavailable {
        width: u64,
        height: u64,
        reason: String,
    },

    #[error("Failed to encode {format}: {reason}")]
    EncodingFailure { format: String, reason: String },

    #[error("Malformed data URL: {reason}")]
    MalformedDataUrl { reason: String },

    #[error("Invalid export options: {message}")]
    InvalidOptions { message: String },

    #[error("Invalid watermark policy: {message}")]
    InvalidWatermark { message: String },

    #[error("Scene rasterization failed: {message}")]
    Scene { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Internal export error: {message}")]
    Internal { message: String },
}

impl ExportError {
    pub fn image_load(reference: impl Into<String>, reason: impl ToString) -> Self {
        Self::ImageLoadFailure {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    pub fn canvas(width: u64, height: u64, reason: impl Into<String>) -> Self {
        Self::CanvasContextUnavailable {
            width,
            height,
            reason: reason.into(),
        }
    }

    pub fn encoding(format: impl Into<String>, reason: impl ToString) -> Self {
        Self::EncodingFailure {
            format: format.into(),
            reason: reason.to_string(),
        }
    }

    pub fn watermark(msg: impl Into<String>) -> Self {
        Self::InvalidWatermark {
            message: msg.into(),
        }
    }

    pub fn scene(msg: impl Into<String>) -> Self {
        Self::Scene {
            message: msg.into(),
        }
    }

    /// Whether the pipeline may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExportError::ImageLoadFailure { .. })
    }
}

impl From<DesignError> for ExportError {
    fn from(err: DesignError) -> Self {
        match err {
            DesignError::InvalidOptions { message } => ExportError::InvalidOptions { message },
            other => ExportError::InvalidOptions {
                message: other.to_string(),
            },
        }
    }
}

impl From<ExportError> for StageError {
    fn from(err: ExportError) -> Self {
        StageError::render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_image_failures_recover() {
        assert!(ExportError::image_load("bg.png", "timed out").is_recoverable());
        assert!(!ExportError::MissingRenderStage.is_recoverable());
        assert!(!ExportError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_design_error_maps_to_invalid_options() {
        let err: ExportError = DesignError::invalid_options("scale must be positive").into();
        assert_eq!(
            err,
            ExportError::InvalidOptions {
                message: "scale must be positive".to_string()
            }
        );
    }

    #[test]
    fn test_converts_into_stage_error() {
        let err: StageError = ExportError::MissingTargetElement {
            target: "card-preview".to_string(),
        }
        .into();
        assert!(err.to_string().contains("card-preview"));
    }
}
