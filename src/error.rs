use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream error: status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("unreadable response: {0}")]
    BadPayload(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("permission denied by server: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("no driver selected")]
    NoDriverSelected,

    #[error("an assignment commit is already in flight")]
    CommitInFlight,

    #[error("operator lacks the {0} capability")]
    PermissionDenied(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Errors that read paths may recover from via the synthetic fallback.
    pub fn is_transient(&self) -> bool {
        match self {
            ConsoleError::Network(_) | ConsoleError::Timeout | ConsoleError::BadPayload(_) => true,
            ConsoleError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Auth failures are surfaced immediately and never retried or masked.
    pub fn is_auth(&self) -> bool {
        matches!(self, ConsoleError::Unauthorized | ConsoleError::Forbidden(_))
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConsoleError::Timeout
        } else if err.is_decode() {
            ConsoleError::BadPayload(err.to_string())
        } else {
            ConsoleError::Network(err.to_string())
        }
    }
}
