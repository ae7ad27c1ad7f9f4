//! Caller-facing failures of the session actions

use cabdash_core::CabError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why a login or registration did not go through.
///
/// Every variant renders as a message that can be shown to the user unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server answered and refused the request
    #[error("{message}")]
    Rejected { message: String },

    /// No response came back from the server
    #[error("No response from server: {message}")]
    Unreachable { message: String },

    /// The request could not be formed or sent
    #[error("Invalid request: {message}")]
    MalformedRequest { message: String },

    /// Login was accepted but the follow-up identity probe found no role
    #[error("Login succeeded but role detection failed. Please try again.")]
    InconsistentState,
}

impl AuthError {
    /// Short machine-readable tag, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Rejected { .. } => "rejected",
            AuthError::Unreachable { .. } => "unreachable",
            AuthError::MalformedRequest { .. } => "malformed_request",
            AuthError::InconsistentState => "inconsistent_state",
        }
    }

    /// Worth offering the user a retry button
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Unreachable { .. } | AuthError::InconsistentState
        )
    }
}

impl From<CabError> for AuthError {
    fn from(error: CabError) -> Self {
        match error {
            CabError::Authentication { message, .. } => AuthError::Rejected { message },
            CabError::NotFound { resource, .. } => AuthError::Rejected {
                message: format!("Not found: {}", resource),
            },
            CabError::Protocol { message, .. } => AuthError::Rejected {
                message: format!("Unexpected response from server: {}", message),
            },
            CabError::Network { message, .. } => AuthError::Unreachable { message },
            CabError::Timeout {
                operation,
                duration_ms,
                ..
            } => AuthError::Unreachable {
                message: format!("{} timed out after {} ms", operation, duration_ms),
            },
            CabError::Validation { message, .. } => AuthError::MalformedRequest { message },
            other => AuthError::MalformedRequest {
                message: other.to_string(),
            },
        }
    }
}
