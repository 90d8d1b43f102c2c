use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{step}: required value '{field}' is not set")]
    MissingField { step: &'static str, field: String },

    #[error("{step}: request failed: {message}")]
    Http { step: &'static str, message: String },

    #[error("{step}: unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        step: &'static str,
        status: u16,
        body: String,
    },

    #[error("{step}: invalid response: {message}")]
    InvalidResponse { step: &'static str, message: String },

    #[error("required tool not found on PATH: {0}")]
    ToolNotInstalled(String),

    #[error("{tool} exited with {status}: {output}")]
    ToolFailed {
        tool: String,
        status: String,
        output: String,
    },

    #[error("git {command} failed:\n{output}")]
    Git { command: String, output: String },

    #[error("failed to sign app assertion: {0}")]
    Signing(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn missing(step: &'static str, field: impl Into<String>) -> Self {
        SyncError::MissingField {
            step,
            field: field.into(),
        }
    }

    pub(crate) fn http(step: &'static str, err: impl std::fmt::Display) -> Self {
        SyncError::Http {
            step,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(step: &'static str, message: impl Into<String>) -> Self {
        SyncError::InvalidResponse {
            step,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
