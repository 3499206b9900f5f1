//! Cloud Storage for Firebase over the v0 REST API

use crate::firebase::transport::{Authorization, RestClient, RestResponse};
use crate::profile::asset_uploader::ObjectStore;
use crate::profile::config::FirebaseConfig;
use crate::profile::error::UploadError;
use async_trait::async_trait;
use hyper::Method;
use serde::Deserialize;
use tracing::info;

pub struct FirebaseStorage {
    rest: RestClient,
    endpoint: String,
    bucket: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

impl FirebaseStorage {
    pub fn new(rest: RestClient, config: &FirebaseConfig) -> Self {
        Self {
            rest,
            endpoint: config.storage_endpoint.trim_end_matches('/').to_string(),
            bucket: config.storage_bucket.clone(),
        }
    }

    fn object_uri(&self, path: &str) -> String {
        object_uri(&self.endpoint, &self.bucket, path)
    }

    fn upload_uri(&self, path: &str) -> String {
        upload_uri(&self.endpoint, &self.bucket, path)
    }
}

#[async_trait]
impl ObjectStore for FirebaseStorage {
    async fn put_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<(), UploadError> {
        let response = self
            .rest
            .send(
                Method::POST,
                &self.upload_uri(path),
                Some(&Authorization::Firebase(auth_token)),
                Some(content_type),
                data,
            )
            .await?;
        let response = fail_unless_success(response)?;

        let metadata: ObjectMetadata = response.json()?;
        info!("Stored object {} in bucket {}", metadata.name, self.bucket);
        Ok(())
    }

    async fn download_url(&self, path: &str, auth_token: &str) -> Result<String, UploadError> {
        let response = self
            .rest
            .send(
                Method::GET,
                &self.object_uri(path),
                Some(&Authorization::Firebase(auth_token)),
                None,
                Vec::new(),
            )
            .await?;
        let response = fail_unless_success(response)?;

        let metadata: ObjectMetadata = response.json()?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                UploadError::Transport(format!("object {} has no download token", metadata.name))
            })?;

        Ok(download_url(&self.object_uri(path), token))
    }
}

fn object_uri(endpoint: &str, bucket: &str, path: &str) -> String {
    format!("{}/b/{}/o/{}", endpoint, bucket, urlencoding::encode(path))
}

fn upload_uri(endpoint: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/b/{}/o?uploadType=media&name={}",
        endpoint,
        bucket,
        urlencoding::encode(path)
    )
}

fn download_url(object_uri: &str, token: &str) -> String {
    format!("{}?alt=media&token={}", object_uri, urlencoding::encode(token))
}

fn fail_unless_success(response: RestResponse) -> Result<RestResponse, UploadError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(UploadError::Transport(response.error_message()))
    }
}
