use crate::domain::lockout::locked_message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Not authenticated")]
    AuthExpired,
    #[error("{detail}")]
    InvalidCredentials {
        detail: String,
        attempts_remaining: Option<u32>,
    },
    /// `retry_after_seconds` is `None` when the server gave no usable
    /// duration; callers fall back to their configured default.
    #[error("{detail}")]
    RateLimited {
        detail: String,
        retry_after_seconds: Option<u64>,
    },
    #[error("{}", locked_message(.remaining_seconds))]
    LockedOut { remaining_seconds: u64 },
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server error: http {status}; {detail}")]
    Server { status: u16, detail: String },
}

impl InfraError {
    /// Failures worth another attempt: the request never got an answer or
    /// the server broke.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_details_are_shown_verbatim() {
        let error = InfraError::InvalidCredentials {
            detail: "Incorrect username or password. 2 attempts remaining".to_string(),
            attempts_remaining: Some(2),
        };
        assert_eq!(
            error.to_string(),
            "Incorrect username or password. 2 attempts remaining"
        );
    }

    #[test]
    fn locked_out_renders_countdown() {
        let error = InfraError::LockedOut {
            remaining_seconds: 150,
        };
        assert_eq!(
            error.to_string(),
            "Too many failed login attempts. Try again in 02:30"
        );
    }

    #[test]
    fn only_network_and_server_errors_are_transient() {
        assert!(InfraError::Network("timed out".to_string()).is_transient());
        assert!(InfraError::Server {
            status: 503,
            detail: "unavailable".to_string()
        }
        .is_transient());
        assert!(!InfraError::AuthExpired.is_transient());
        assert!(!InfraError::Rejected {
            status: 400,
            detail: "bad".to_string()
        }
        .is_transient());
    }
}
