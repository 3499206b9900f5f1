//! Profile documents in the document database
//! Structure: users/{uid} { profileImageUrl }

use crate::profile::asset_uploader::RemoteAssetRef;
use crate::profile::error::PersistError;
use crate::profile::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

pub const USERS_COLLECTION: &str = "users";
pub const PROFILE_IMAGE_FIELD: &str = "profileImageUrl";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Set one string field, creating the document if needed.
    async fn update_field(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
        value: &str,
        auth_token: &str,
    ) -> Result<(), PersistError>;

    async fn get_field(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
        auth_token: &str,
    ) -> Result<Option<String>, PersistError>;
}

pub struct ProfileRecordStore {
    documents: Arc<dyn DocumentStore>,
}

impl ProfileRecordStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Point the signed-in user's profile at an uploaded photo. Without a
    /// session nothing is written.
    pub async fn attach_asset_ref(
        &self,
        session: Option<&Session>,
        reference: &RemoteAssetRef,
    ) -> Result<(), PersistError> {
        let session = session.ok_or(PersistError::NoSession)?;

        self.documents
            .update_field(
                USERS_COLLECTION,
                &session.user_id,
                PROFILE_IMAGE_FIELD,
                &reference.url,
                session.id_token(),
            )
            .await
            .map_err(|e| {
                error!("Saving image URL for '{}' failed: {}", session.user_id, e);
                e
            })?;

        info!("Image URL saved for user '{}'", session.user_id);
        Ok(())
    }

    pub async fn profile_image_url(
        &self,
        session: Option<&Session>,
    ) -> Result<Option<String>, PersistError> {
        let session = session.ok_or(PersistError::NoSession)?;

        self.documents
            .get_field(
                USERS_COLLECTION,
                &session.user_id,
                PROFILE_IMAGE_FIELD,
                session.id_token(),
            )
            .await
    }
}
