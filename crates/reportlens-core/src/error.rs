use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid number '{text}': {reason}")]
    InvalidNumber { text: String, reason: String },

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("failed to load pattern overlay from {path}: {reason}")]
    OverlayLoad { path: PathBuf, reason: String },

    #[error("invalid pattern overlay: {0}")]
    OverlayInvalid(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("extractor '{name}' failed: {reason}")]
    Extractor { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    pub(crate) fn invalid_number(text: &str, reason: impl Into<String>) -> Self {
        ReportError::InvalidNumber {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}
