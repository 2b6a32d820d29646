/// Core error types for the Tessera engine.
use std::path::PathBuf;

/// A specialized Result type for Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Top-level error type encompassing all Tessera subsystems.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    #[error("render error: {0}")]
    Render(String),

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("kernel error: {0}")]
    Kernel(String),

    #[error("config error: {message} ({path:?})")]
    Config { message: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl TesseraError {
    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        TesseraError::Render(message.into())
    }

    /// Create a configuration error tied to the file it came from.
    pub fn config(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        TesseraError::Config {
            message: message.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        let err = TesseraError::render("framebuffer is not attached");
        assert_eq!(err.to_string(), "render error: framebuffer is not attached");
    }

    #[test]
    fn test_config_error_display() {
        let err = TesseraError::config("unknown backend", "/etc/tessera.toml");
        assert!(err.to_string().contains("unknown backend"));
        assert!(err.to_string().contains("tessera.toml"));
    }
}
