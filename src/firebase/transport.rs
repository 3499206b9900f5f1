//! HTTPS transport shared by the Firebase REST clients

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),

    #[error("Failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The `error.message` of a Google API error body, or the status line.
    pub fn error_message(&self) -> String {
        match serde_json::from_slice::<ErrorEnvelope>(&self.body) {
            Ok(envelope) => envelope.error.message,
            Err(_) => format!(
                "HTTP {} {}",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string(),
        }
    }
}

/// Credential attached to a request. Storage expects the `Firebase` scheme,
/// Firestore plain OAuth `Bearer`.
#[derive(Debug, Clone, Copy)]
pub enum Authorization<'a> {
    Bearer(&'a str),
    Firebase(&'a str),
}

impl Authorization<'_> {
    fn header_value(&self) -> String {
        match self {
            Authorization::Bearer(token) => format!("Bearer {}", token),
            Authorization::Firebase(token) => format!("Firebase {}", token),
        }
    }
}

#[derive(Clone)]
pub struct RestClient {
    client: HttpsClient,
    timeout: Duration,
}

impl RestClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| TransportError::Tls(format!("no native root certificates: {}", e)))?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        Ok(Self::from_connector(connector, timeout))
    }

    fn from_connector(connector: HttpsConnector<HttpConnector>, timeout: Duration) -> Self {
        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);
        Self { client, timeout }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&Authorization<'_>>,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<RestResponse, TransportError> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = authorization {
            builder = builder.header(AUTHORIZATION, auth.header_value());
        }
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder.body(Full::new(Bytes::from(body)))?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body = response.into_body().collect().await?.to_bytes();
            Ok::<_, TransportError>(RestResponse { status, body })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }

    pub async fn send_json<T: Serialize>(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&Authorization<'_>>,
        payload: &T,
    ) -> Result<RestResponse, TransportError> {
        let body = serde_json::to_vec(payload)?;
        self.send(method, uri, authorization, Some("application/json"), body)
            .await
    }
}
