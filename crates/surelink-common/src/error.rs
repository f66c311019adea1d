//! Common error types for Surelink components.

use thiserror::Error;

/// Errors surfaced by the captcha and caching engine
#[derive(Debug, Error)]
pub enum SurelinkError {
    /// The challenge queue is at capacity
    #[error("Captcha queue is full")]
    QueueFull,

    /// No pre-rendered challenge is available
    #[error("Captcha queue is empty")]
    QueueEmpty,

    /// Challenge is unknown, expired, or already consumed
    #[error("Challenge not found")]
    ChallengeNotFound,

    /// Challenge existed but the submitted answer did not match
    #[error("Incorrect captcha answer")]
    IncorrectAnswer,

    /// No link exists for the short code
    #[error("Link not found: {0}")]
    LinkNotFound(String),

    /// Every candidate short code collided with an existing one
    #[error("Short code generation exhausted after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    /// Destination is not an acceptable URL
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Destination host failed validation
    #[error("Host rejected: {0}")]
    HostRejected(String),

    /// Cache or persistent store connection/operation error
    #[error("Store error: {0}")]
    Store(String),

    /// DNS resolution failed for a reason other than a missing host
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Store operation exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Captcha image rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SurelinkError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::QueueFull => 503,
            Self::QueueEmpty => 503,
            Self::ChallengeNotFound => 403,
            Self::IncorrectAnswer => 403,
            Self::LinkNotFound(_) => 404,
            Self::CodeGenerationExhausted { .. } => 503,
            Self::InvalidDestination(_) => 400,
            Self::HostRejected(_) => 422,
            Self::Store(_) => 503,
            Self::Resolver(_) => 503,
            Self::Timeout(_) => 504,
            Self::Render(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Resolver(_) | Self::Timeout(_))
    }

    /// Returns true for negative results caused by user input rather than the system
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ChallengeNotFound
                | Self::IncorrectAnswer
                | Self::LinkNotFound(_)
                | Self::InvalidDestination(_)
                | Self::HostRejected(_)
        )
    }
}

impl From<serde_json::Error> for SurelinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SurelinkError::LinkNotFound("zzzzzz".into()).status_code(), 404);
        assert_eq!(
            SurelinkError::CodeGenerationExhausted { attempts: 5 }.status_code(),
            503
        );
        assert_eq!(SurelinkError::ChallengeNotFound.status_code(), 403);
        assert_eq!(SurelinkError::IncorrectAnswer.status_code(), 403);
        assert_eq!(SurelinkError::Resolver("EAI_AGAIN".into()).status_code(), 503);
    }

    #[test]
    fn test_retry_classification() {
        assert!(SurelinkError::Store("down".into()).is_retryable());
        assert!(SurelinkError::Timeout("get".into()).is_retryable());
        assert!(!SurelinkError::ChallengeNotFound.is_retryable());
        assert!(SurelinkError::ChallengeNotFound.is_user_error());
        assert!(!SurelinkError::QueueEmpty.is_user_error());
        assert!(SurelinkError::Resolver("down".into()).is_retryable());
        assert!(SurelinkError::IncorrectAnswer.is_user_error());
    }
}
