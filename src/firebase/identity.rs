//! Firebase Authentication over the Identity Toolkit REST API

use crate::firebase::transport::{RestClient, RestResponse};
use crate::profile::auth::IdentityProvider;
use crate::profile::config::FirebaseConfig;
use crate::profile::error::AuthError;
use crate::profile::session::IdentityGrant;
use async_trait::async_trait;
use hyper::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// Any HTTPS URI registered for the project; only used as the IdP redirect.
const IDP_REQUEST_URI: &str = "http://localhost";

const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
const MAX_EXPIRES_IN_SECS: i64 = 86_400;

pub struct FirebaseIdentity {
    rest: RestClient,
    api_key: String,
    identity_endpoint: String,
    token_endpoint: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    email: Option<String>,
    expires_in: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

impl FirebaseIdentity {
    pub fn new(rest: RestClient, config: &FirebaseConfig) -> Self {
        Self {
            rest,
            api_key: config.api_key.clone(),
            identity_endpoint: config.identity_endpoint.trim_end_matches('/').to_string(),
            token_endpoint: config.token_endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn accounts_uri(&self, action: &str) -> String {
        accounts_uri(&self.identity_endpoint, action, &self.api_key)
    }

    async fn account_call(
        &self,
        action: &str,
        payload: serde_json::Value,
    ) -> Result<IdentityGrant, AuthError> {
        let response = self
            .rest
            .send_json(Method::POST, &self.accounts_uri(action), None, &payload)
            .await?;
        let response = reject_unless_success(response)?;

        let account: AccountResponse = response.json()?;
        Ok(IdentityGrant {
            user_id: account.local_id,
            id_token: account.id_token,
            refresh_token: account.refresh_token,
            email: account.email,
            expires_in_secs: parse_expiry(&account.expires_in),
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityGrant, AuthError> {
        self.account_call(
            "signInWithPassword",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityGrant, AuthError> {
        self.account_call(
            "signUp",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    async fn sign_in_with_id_token(
        &self,
        provider_id: &str,
        id_token: &str,
    ) -> Result<IdentityGrant, AuthError> {
        self.account_call("signInWithIdp", idp_payload(provider_id, id_token))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IdentityGrant, AuthError> {
        let uri = format!(
            "{}/token?key={}",
            self.token_endpoint,
            urlencoding::encode(&self.api_key)
        );
        let payload = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        let response = self
            .rest
            .send_json(Method::POST, &uri, None, &payload)
            .await?;
        let response = reject_unless_success(response)?;

        let refreshed: RefreshResponse = response.json()?;
        Ok(IdentityGrant {
            user_id: refreshed.user_id,
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            email: None,
            expires_in_secs: parse_expiry(&refreshed.expires_in),
        })
    }
}

fn accounts_uri(endpoint: &str, action: &str, api_key: &str) -> String {
    format!(
        "{}/accounts:{}?key={}",
        endpoint,
        action,
        urlencoding::encode(api_key)
    )
}

/// `signInWithIdp` request carrying a third-party id token as a form-encoded `postBody`.
fn idp_payload(provider_id: &str, id_token: &str) -> serde_json::Value {
    let post_body = format!(
        "id_token={}&providerId={}",
        urlencoding::encode(id_token),
        urlencoding::encode(provider_id)
    );
    json!({
        "postBody": post_body,
        "requestUri": IDP_REQUEST_URI,
        "returnSecureToken": true,
        "returnIdpCredential": true,
    })
}

fn reject_unless_success(response: RestResponse) -> Result<RestResponse, AuthError> {
    if response.is_success() {
        return Ok(response);
    }
    let message = response.error_message();
    if response.status.is_client_error() {
        Err(AuthError::Rejected { message })
    } else {
        Err(AuthError::Transport(message))
    }
}

/// `expiresIn` comes back as a decimal string of seconds.
fn parse_expiry(raw: &str) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(secs) => secs.clamp(0, MAX_EXPIRES_IN_SECS),
        Err(_) => {
            warn!("Unparseable expiresIn '{}', assuming one hour", raw);
            DEFAULT_EXPIRES_IN_SECS
        }
    }
}
