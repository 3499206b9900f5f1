//! Google account sign-in through the OAuth installed-app flow

use crate::profile::auth::{FederatedFlow, GOOGLE_PROVIDER_ID};
use crate::profile::config::GoogleSignInConfig;
use crate::profile::error::AuthError;
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::info;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

pub type GoogleAuthenticator = Authenticator<HttpsConnector<HttpConnector>>;

const SIGN_IN_SCOPES: &[&str] = &["openid", "email", "profile"];

pub struct GoogleSignIn {
    authenticator: GoogleAuthenticator,
}

impl GoogleSignIn {
    pub async fn new(config: &GoogleSignInConfig) -> Result<Self, AuthError> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let secret = yup_oauth2::read_application_secret(&config.client_secret_path)
            .await
            .map_err(|e| {
                AuthError::Transport(format!(
                    "Failed to read client secret '{}': {}",
                    config.client_secret_path.display(),
                    e
                ))
            })?;

        let authenticator =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .persist_tokens_to_disk(config.token_cache_path.clone())
                .build()
                .await
                .map_err(|e| {
                    AuthError::Transport(format!("Failed to build authenticator: {}", e))
                })?;

        info!("Google sign-in ready (token cache {})", config.token_cache_path.display());
        Ok(Self { authenticator })
    }
}

#[async_trait]
impl FederatedFlow for GoogleSignIn {
    fn provider_id(&self) -> &str {
        GOOGLE_PROVIDER_ID
    }

    async fn obtain_id_token(&self) -> Result<Option<String>, AuthError> {
        self.authenticator
            .id_token(SIGN_IN_SCOPES)
            .await
            .map_err(|e| AuthError::Rejected {
                message: format!("Google sign-in failed: {}", e),
            })
    }
}
