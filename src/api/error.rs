use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a backend call, in one shape regardless of where it went wrong.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 or 403: the credential is missing, expired or rejected.
    #[error("not authorized ({status}): {message}")]
    Unauthorized { status: StatusCode, message: String },
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid API base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Unauthorized { status, message }
        } else {
            Self::Status { status, message }
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) | Self::InvalidUrl(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message, .. } | Self::Status { message, .. } => message,
            Self::Transport(message) | Self::Decode(message) | Self::InvalidUrl(message) => message,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Pick the most useful message out of an error response body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}
