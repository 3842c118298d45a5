/// Client error type
///
/// Errors are `Clone` so a single failed fetch can be handed to every caller
/// coalesced onto it by the query cache.

use regen_shared::onboarding::OnboardingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Request never produced a response (connection, timeout, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// No valid session (401)
    #[error("Not signed in")]
    Unauthenticated,

    /// Server answered with an error body
    #[error("API error {status} ({error}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    /// Response body didn't match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Local store read or write failed
    #[error("Local store error: {0}")]
    Store(String),

    /// The workspace changed while the fetch was in flight; its result was discarded
    #[error("Result discarded: workspace changed during fetch")]
    Superseded,

    /// The selected enterprise is not one of the user's workspaces
    #[error("Not a member of workspace {0}")]
    NotAMember(uuid::Uuid),

    /// No workspace selected (the user has no memberships)
    #[error("No workspace selected")]
    NoWorkspace,

    /// Onboarding flow or step not recognized
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    /// Polling stopped by its cancellation token
    #[error("Canceled")]
    Canceled,

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Unauthenticated => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let err = ClientError::Api {
            status: 404,
            error: "not_found".to_string(),
            message: "Seed job not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert_eq!(ClientError::Unauthenticated.status(), Some(401));
        assert_eq!(ClientError::Canceled.status(), None);
    }
}
