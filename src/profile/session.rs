//! Authenticated session state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

/// Sessions are treated as expired this long before the provider says so.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Upper bound on a grant lifetime; ID tokens live one hour.
const MAX_LIFETIME_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInMethod {
    Password,
    Federated,
}

/// What the identity provider hands back after a successful exchange.
#[derive(Clone, PartialEq)]
pub struct IdentityGrant {
    pub user_id: String,
    pub id_token: String,
    pub refresh_token: String,
    pub email: Option<String>,
    pub expires_in_secs: i64,
}

#[derive(Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub method: SignInMethod,
    pub expires_at: DateTime<Utc>,
    id_token: String,
    refresh_token: String,
}

impl Session {
    pub fn from_grant(grant: IdentityGrant, method: SignInMethod) -> Self {
        Self {
            user_id: grant.user_id,
            email: grant.email,
            method,
            expires_at: Utc::now()
                + Duration::seconds(grant.expires_in_secs.clamp(0, MAX_LIFETIME_SECS)),
            id_token: grant.id_token,
            refresh_token: grant.refresh_token,
        }
    }

    /// Bearer token for authorized storage and database calls
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    /// Apply a refresh grant. The provider may omit the email on refresh.
    pub fn refreshed(&self, grant: IdentityGrant) -> Self {
        let mut next = Session::from_grant(grant, self.method);
        if next.email.is_none() {
            next.email = self.email.clone();
        }
        next
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("method", &self.method)
            .field("expires_at", &self.expires_at)
            .field("id_token", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for IdentityGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityGrant")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_in_secs", &self.expires_in_secs)
            .finish_non_exhaustive()
    }
}

/// Slot holding the signed-in user, shared between the gateway and the API.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn set(&self, session: Session) {
        *self.inner.write().await = Some(session);
    }

    pub async fn clear(&self) -> Option<Session> {
        self.inner.write().await.take()
    }

    /// Exclusive access to the slot; sign-in and sign-out wait until the guard drops.
    pub async fn lock(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().await
    }
}
