use std::path::PathBuf;
use thiserror::Error;

/// File attached to an error
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }
}

#[derive(Error, Debug)]
pub enum SluiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Include error: {0}")]
    Include(String),

    #[error("CSS error: {message}")]
    Css {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("JS error: {message}")]
    Js {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Image error: {0}")]
    Image(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("{0}")]
    Other(String),
}

impl SluiceError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn css(message: impl Into<String>) -> Self {
        Self::Css {
            message: message.into(),
            context: None,
        }
    }

    pub fn css_in(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Css {
            message: message.into(),
            context: Some(ErrorContext::new().with_file(path)),
        }
    }

    pub fn js(message: impl Into<String>) -> Self {
        Self::Js {
            message: message.into(),
            context: None,
        }
    }

    pub fn js_in(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Js {
            message: message.into(),
            context: Some(ErrorContext::new().with_file(path)),
        }
    }

    pub fn include(message: impl Into<String>) -> Self {
        Self::Include(message.into())
    }

    pub fn image(message: impl Into<String>) -> Self {
        Self::Image(message.into())
    }

    /// Format error with its file context, if any
    pub fn format_detailed(&self) -> String {
        match self {
            SluiceError::Css { message, context } => {
                Self::format_with_context("CSS Error", message, context)
            }
            SluiceError::Js { message, context } => {
                Self::format_with_context("JS Error", message, context)
            }
            _ => self.to_string(),
        }
    }

    fn format_with_context(
        error_type: &str,
        message: &str,
        context: &Option<ErrorContext>,
    ) -> String {
        let mut output = format!("{}: {}", error_type, message);

        if let Some(file_path) = context.as_ref().and_then(|ctx| ctx.file_path.as_ref()) {
            output.push_str(&format!("\n  File: {}", file_path.display()));
        }

        output
    }
}

pub type Result<T> = std::result::Result<T, SluiceError>;

impl From<regex::Error> for SluiceError {
    fn from(err: regex::Error) -> Self {
        SluiceError::Other(format!("Regex error: {}", err))
    }
}

impl From<serde_json::Error> for SluiceError {
    fn from(err: serde_json::Error) -> Self {
        SluiceError::Config(err.to_string())
    }
}

impl From<anyhow::Error> for SluiceError {
    fn from(err: anyhow::Error) -> Self {
        SluiceError::Other(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SluiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        SluiceError::Other(format!("Background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detailed_format_includes_file() {
        let err = SluiceError::css_in("unexpected token", PathBuf::from("src/css/style.css"));
        let detailed = err.format_detailed();

        assert!(detailed.starts_with("CSS Error: unexpected token"));
        assert!(detailed.contains("src/css/style.css"));
    }

    #[test]
    fn test_error_without_file() {
        let err = SluiceError::js("bad syntax");
        assert_eq!(err.format_detailed(), "JS Error: bad syntax");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SluiceError = io.into();
        assert!(matches!(err, SluiceError::Io(_)));
    }
}
