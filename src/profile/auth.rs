//! Credential exchange and session lifecycle

use crate::profile::error::AuthError;
use crate::profile::session::{IdentityGrant, Session, SessionStore, SignInMethod};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Remote identity service that turns credentials into a grant.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityGrant, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityGrant, AuthError>;

    /// Exchange a third-party OpenID token issued by `provider_id`.
    async fn sign_in_with_id_token(
        &self,
        provider_id: &str,
        id_token: &str,
    ) -> Result<IdentityGrant, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<IdentityGrant, AuthError>;
}

/// Upstream federated sign-in (e.g. the Google account chooser).
#[async_trait]
pub trait FederatedFlow: Send + Sync {
    fn provider_id(&self) -> &str;

    /// `Ok(None)` when the flow finished without issuing an id token.
    async fn obtain_id_token(&self) -> Result<Option<String>, AuthError>;
}

pub struct CredentialGateway {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionStore,
}

impl CredentialGateway {
    pub fn new(provider: Arc<dyn IdentityProvider>, sessions: SessionStore) -> Self {
        Self { provider, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;

        let grant = self
            .provider
            .sign_in_with_password(email.trim(), password)
            .await?;
        let session = Session::from_grant(grant, SignInMethod::Password);
        self.sessions.set(session.clone()).await;

        info!("Signed in user '{}' with password", session.user_id);
        Ok(session)
    }

    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;

        let grant = self.provider.sign_up(email.trim(), password).await?;
        let session = Session::from_grant(grant, SignInMethod::Password);
        self.sessions.set(session.clone()).await;

        info!("Registered user '{}'", session.user_id);
        Ok(session)
    }

    pub async fn sign_in_with_federated_token(
        &self,
        id_token: Option<String>,
    ) -> Result<Session, AuthError> {
        self.exchange_federated(GOOGLE_PROVIDER_ID, id_token).await
    }

    /// Run the upstream flow, then exchange whatever token it produced.
    pub async fn sign_in_with_federated_flow(
        &self,
        flow: &dyn FederatedFlow,
    ) -> Result<Session, AuthError> {
        let id_token = flow.obtain_id_token().await?;
        self.exchange_federated(flow.provider_id(), id_token).await
    }

    async fn exchange_federated(
        &self,
        provider_id: &str,
        id_token: Option<String>,
    ) -> Result<Session, AuthError> {
        let id_token = match id_token {
            Some(token) if !token.trim().is_empty() => token,
            _ => return Err(AuthError::TokenMissing),
        };

        let grant = self
            .provider
            .sign_in_with_id_token(provider_id, &id_token)
            .await?;
        let session = Session::from_grant(grant, SignInMethod::Federated);
        self.sessions.set(session.clone()).await;

        info!(
            "Signed in user '{}' via federated provider {}",
            session.user_id, provider_id
        );
        Ok(session)
    }

    pub async fn sign_out(&self) {
        if let Some(session) = self.sessions.clear().await {
            info!("Signed out user '{}'", session.user_id);
        }
    }

    /// Stored session regardless of expiry
    pub async fn current_session(&self) -> Option<Session> {
        self.sessions.get().await
    }

    /// A usable session. An expired session gets one refresh attempt; if that
    /// fails the session is dropped and the user has to sign in again.
    ///
    /// The refresh runs under the store's write lock, so concurrent callers
    /// share one refresh and a sign-out issued meanwhile is applied after it.
    pub async fn active_session(&self) -> Option<Session> {
        let session = self.sessions.get().await?;
        if !session.is_expired() {
            return Some(session);
        }

        let mut slot = self.sessions.lock().await;
        let session = match slot.as_ref() {
            Some(current) if current.is_expired() => current.clone(),
            other => return other.cloned(),
        };

        match self.provider.refresh(session.refresh_token()).await {
            Ok(grant) => {
                let refreshed = session.refreshed(grant);
                *slot = Some(refreshed.clone());
                info!("Refreshed session for user '{}'", refreshed.user_id);
                Some(refreshed)
            }
            Err(e) => {
                warn!(
                    "Session refresh failed for user '{}': {}; signing out",
                    session.user_id, e
                );
                *slot = None;
                None
            }
        }
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(AuthError::InvalidInput(
            "email and password are required".to_string(),
        ));
    }
    Ok(())
}
