use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The credential cannot be obtained without the user. `action_handle`
    /// is opaque to the core and is handed back to the host unchanged.
    #[error("User action required to authorize access")]
    UserActionRequired { action_handle: String },

    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    pub fn action_handle(&self) -> Option<&str> {
        match self {
            AuthError::UserActionRequired { action_handle } => Some(action_handle),
            _ => None,
        }
    }

    /// Whether a later attempt without user involvement may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::TokenRefreshFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_handle() {
        let err = AuthError::UserActionRequired {
            action_handle: "consent:abc".to_string(),
        };
        assert_eq!(err.action_handle(), Some("consent:abc"));
        assert_eq!(AuthError::NotAuthenticated.action_handle(), None);
    }

    #[test]
    fn test_transient() {
        assert!(AuthError::TokenRefreshFailed("503".into()).is_transient());
        assert!(!AuthError::NotAuthenticated.is_transient());
    }
}
