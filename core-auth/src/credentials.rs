//! Credential acquisition seam.
//!
//! The sync core never performs OAuth itself. It asks a [`CredentialProvider`]
//! for a token before each pass and tells it when the remote rejected one.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, ProfileId};

/// Source of access tokens for sync accounts.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a usable token, refreshing silently if possible.
    ///
    /// # Errors
    ///
    /// [`AuthError::UserActionRequired`] when only the user can unblock the
    /// account (consent revoked, password changed).
    async fn access_token(&self, profile_id: ProfileId) -> Result<AccessToken>;

    /// Drop a token the remote rejected so the next call does not return it.
    async fn invalidate(&self, profile_id: ProfileId, token: &AccessToken) -> Result<()>;
}

/// In-memory provider for hosts that manage tokens themselves.
///
/// Once a token is invalidated the profile reports `UserActionRequired` with
/// the configured handle until the host stores a new token.
pub struct StaticCredentialProvider {
    tokens: RwLock<HashMap<ProfileId, AccessToken>>,
    action_handle: String,
}

impl StaticCredentialProvider {
    pub fn new(action_handle: impl Into<String>) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            action_handle: action_handle.into(),
        }
    }

    pub async fn set_token(&self, profile_id: ProfileId, token: AccessToken) {
        info!(profile_id = %profile_id, "Stored access token");
        self.tokens.write().await.insert(profile_id, token);
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn access_token(&self, profile_id: ProfileId) -> Result<AccessToken> {
        self.tokens
            .read()
            .await
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| AuthError::UserActionRequired {
                action_handle: self.action_handle.clone(),
            })
    }

    async fn invalidate(&self, profile_id: ProfileId, token: &AccessToken) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.get(&profile_id) == Some(token) {
            tokens.remove(&profile_id);
            debug!(profile_id = %profile_id, "Invalidated access token");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Credentials {}

        #[async_trait]
        impl CredentialProvider for Credentials {
            async fn access_token(&self, profile_id: ProfileId) -> Result<AccessToken>;
            async fn invalidate(&self, profile_id: ProfileId, token: &AccessToken) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn test_static_provider_lifecycle() {
        let provider = StaticCredentialProvider::new("consent://reauthorize");
        let profile = ProfileId::new();

        let err = provider.access_token(profile).await.unwrap_err();
        assert_eq!(err.action_handle(), Some("consent://reauthorize"));

        provider.set_token(profile, AccessToken::new("t1")).await;
        let token = provider.access_token(profile).await.unwrap();
        assert_eq!(token.secret(), "t1");

        provider.invalidate(profile, &token).await.unwrap();
        assert!(matches!(
            provider.access_token(profile).await,
            Err(AuthError::UserActionRequired { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_ignores_stale_token() {
        let provider = StaticCredentialProvider::new("handle");
        let profile = ProfileId::new();

        provider.set_token(profile, AccessToken::new("fresh")).await;
        provider
            .invalidate(profile, &AccessToken::new("stale"))
            .await
            .unwrap();

        assert_eq!(provider.access_token(profile).await.unwrap().secret(), "fresh");
    }

    #[tokio::test]
    async fn test_provider_as_trait_object() {
        let mut mock = MockCredentials::new();
        mock.expect_access_token()
            .times(1)
            .returning(|_| Ok(AccessToken::new("mocked")));

        let provider: Box<dyn CredentialProvider> = Box::new(mock);
        let token = provider.access_token(ProfileId::new()).await.unwrap();
        assert_eq!(token.secret(), "mocked");
    }
}
