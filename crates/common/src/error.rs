//! Error types shared across Stage crates.

use std::path::PathBuf;

/// Top-level error type for Stage operations.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Design error: {message}")]
    Design { message: String },

    #[error("Font error: {message}")]
    Font { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using StageError.
pub type StageResult<T> = Result<T, StageError>;

impl StageError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn design(msg: impl Into<String>) -> Self {
        Self::Design {
            message: msg.into(),
        }
    }

    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_message() {
        let err = StageError::render("surface too large");
        assert_eq!(err.to_string(), "Render error: surface too large");
    }

    #[test]
    fn test_io_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StageError = io.into();
        assert_eq!(err.to_string(), "gone");
    }
}
