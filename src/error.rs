//! Error types shared by the HTTP client and the local store

use thiserror::Error;

/// Failure talking to the LifeTrace backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Server answered with a non-2xx status.
    #[error("API request failed: {status} {reason}")]
    Status { status: u16, reason: String },

    /// Connection refused, DNS failure, timeout, ...
    #[error("cannot reach server: {0}")]
    Transport(String),

    /// Body could not be read or did not match the expected shape.
    #[error("invalid response: {0}")]
    Decode(#[from] std::io::Error),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => ApiError::Status {
                status,
                reason: response.status_text().to_string(),
            },
            ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
        }
    }
}

impl ApiError {
    /// Whether the request never got an answer from the server.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// Failure reading or writing the local key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_mentions_code() {
        let err = ApiError::Status {
            status: 503,
            reason: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "API request failed: 503 Service Unavailable");
        assert!(!err.is_unreachable());
    }

    #[test]
    fn test_transport_is_unreachable() {
        assert!(ApiError::Transport("connection refused".into()).is_unreachable());
    }
}
