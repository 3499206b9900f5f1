//! Upload of captured photos to object storage
//! Structure: user_faces/{uid}/{asset_id}.jpg

use crate::profile::capture::CapturedAsset;
use crate::profile::error::UploadError;
use crate::profile::session::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

const FACES_FOLDER: &str = "user_faces";
const JPEG_MIME: &str = "image/jpeg";

/// Durable reference to an uploaded photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAssetRef {
    pub object_path: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<(), UploadError>;

    /// Public download URL of an existing object.
    async fn download_url(&self, path: &str, auth_token: &str) -> Result<String, UploadError>;
}

pub struct AssetUploader {
    store: Arc<dyn ObjectStore>,
}

impl AssetUploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn object_path(&self, user_id: &str, asset: &CapturedAsset) -> String {
        format!("{}/{}/{}.jpg", FACES_FOLDER, user_id, asset.id)
    }

    /// Send the photo, then look up its download URL. Single attempt.
    /// The local file is removed afterwards whether or not the upload succeeded.
    pub async fn upload(
        &self,
        asset: CapturedAsset,
        session: &Session,
    ) -> Result<RemoteAssetRef, UploadError> {
        let result = self.send(&asset, session).await;
        asset.discard().await;
        result
    }

    async fn send(
        &self,
        asset: &CapturedAsset,
        session: &Session,
    ) -> Result<RemoteAssetRef, UploadError> {
        let data = tokio::fs::read(&asset.path).await.map_err(|e| {
            UploadError::AssetUnreadable(format!("{}: {}", asset.path.display(), e))
        })?;

        let object_path = self.object_path(&session.user_id, asset);
        let size = data.len();

        self.store
            .put_object(&object_path, data, JPEG_MIME, session.id_token())
            .await
            .map_err(|e| {
                error!("Upload of {} failed: {}", object_path, e);
                e
            })?;

        let url = self
            .store
            .download_url(&object_path, session.id_token())
            .await
            .map_err(|e| {
                error!("Download URL lookup for {} failed: {}", object_path, e);
                e
            })?;

        info!(
            "Uploaded photo {} for user '{}' ({} bytes): {}",
            asset.id, session.user_id, size, object_path
        );
        Ok(RemoteAssetRef { object_path, url })
    }
}
