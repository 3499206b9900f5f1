//! In-memory collaborators for unit tests

use crate::profile::asset_uploader::{AssetUploader, ObjectStore};
use crate::profile::auth::{CredentialGateway, FederatedFlow, IdentityProvider, GOOGLE_PROVIDER_ID};
use crate::profile::capture::{
    CameraDevice, CapturedAsset, ConsentGate, MediaCaptureBroker, PermissionState,
};
use crate::profile::error::{AuthError, PersistError, UploadError};
use crate::profile::pipeline::CapturePipeline;
use crate::profile::profile_store::{DocumentStore, ProfileRecordStore};
use crate::profile::session::{IdentityGrant, Session, SessionStore, SignInMethod};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir()
        .join("face_profile_tests")
        .join(Uuid::new_v4().to_string())
}

pub async fn write_asset(bytes: &[u8]) -> CapturedAsset {
    let dir = scratch_dir();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let id = Uuid::new_v4();
    let path = dir.join(format!("face_{}.jpg", id));
    tokio::fs::write(&path, bytes).await.unwrap();
    CapturedAsset {
        id,
        path,
        captured_at: Utc::now(),
    }
}

pub fn session_for(user_id: &str) -> Session {
    Session::from_grant(
        IdentityGrant {
            user_id: user_id.to_string(),
            id_token: format!("token-{}", user_id),
            refresh_token: format!("refresh-{}", user_id),
            email: None,
            expires_in_secs: 3600,
        },
        SignInMethod::Password,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    SignIn(String),
    SignUp(String),
    IdToken(String, String),
    Refresh(String),
}

pub struct MockIdentity {
    calls: Mutex<Vec<ProviderCall>>,
    rejection: Mutex<Option<String>>,
    expires_in_secs: Mutex<i64>,
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::with_expiry(3600)
    }
}

impl MockIdentity {
    pub fn with_expiry(expires_in_secs: i64) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rejection: Mutex::new(None),
            expires_in_secs: Mutex::new(expires_in_secs),
        }
    }

    pub fn rejecting(message: &str) -> Self {
        let identity = Self::default();
        identity.reject_with(message);
        identity
    }

    pub fn reject_with(&self, message: &str) {
        *self.rejection.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_expiry(&self, expires_in_secs: i64) {
        *self.expires_in_secs.lock().unwrap() = expires_in_secs;
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: ProviderCall, subject: &str, id_token: &str) -> Result<IdentityGrant, AuthError> {
        self.calls.lock().unwrap().push(call);
        if let Some(message) = self.rejection.lock().unwrap().clone() {
            return Err(AuthError::Rejected { message });
        }
        Ok(IdentityGrant {
            user_id: format!("uid-{}", subject),
            id_token: id_token.to_string(),
            refresh_token: format!("refresh-{}", subject),
            email: subject.contains('@').then(|| subject.to_string()),
            expires_in_secs: *self.expires_in_secs.lock().unwrap(),
        })
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<IdentityGrant, AuthError> {
        self.respond(ProviderCall::SignIn(email.to_string()), email, "password-token")
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<IdentityGrant, AuthError> {
        self.respond(ProviderCall::SignUp(email.to_string()), email, "password-token")
    }

    async fn sign_in_with_id_token(
        &self,
        provider_id: &str,
        id_token: &str,
    ) -> Result<IdentityGrant, AuthError> {
        self.respond(
            ProviderCall::IdToken(provider_id.to_string(), id_token.to_string()),
            "federated",
            "federated-token",
        )
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IdentityGrant, AuthError> {
        let subject = refresh_token.trim_start_matches("refresh-").to_string();
        self.respond(
            ProviderCall::Refresh(refresh_token.to_string()),
            &subject,
            "refreshed-token",
        )
    }
}

pub struct MockFlow {
    token: Option<String>,
}

impl MockFlow {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string),
        }
    }
}

#[async_trait]
impl FederatedFlow for MockFlow {
    fn provider_id(&self) -> &str {
        GOOGLE_PROVIDER_ID
    }

    async fn obtain_id_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.token.clone())
    }
}

pub struct MockCamera {
    succeed: bool,
}

impl MockCamera {
    pub fn succeeding() -> Self {
        Self { succeed: true }
    }

    pub fn failing() -> Self {
        Self { succeed: false }
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    async fn capture_to(&self, target: &Path) -> bool {
        // A failing device may still leave a truncated file behind.
        let bytes: &[u8] = if self.succeed { b"\xFF\xD8jpeg\xFF\xD9" } else { b"\xFF" };
        tokio::fs::write(target, bytes).await.is_ok() && self.succeed
    }
}

#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    last_token: Mutex<Option<String>>,
    failure: Option<String>,
}

impl MockObjectStore {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.lock().unwrap().get(path).map(|(_, ct)| ct.clone())
    }

    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<(), UploadError> {
        if let Some(message) = &self.failure {
            return Err(UploadError::Transport(message.clone()));
        }
        *self.last_token.lock().unwrap() = Some(auth_token.to_string());
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn download_url(&self, path: &str, _auth_token: &str) -> Result<String, UploadError> {
        if !self.objects.lock().unwrap().contains_key(path) {
            return Err(UploadError::Transport(format!("no such object {}", path)));
        }
        Ok(format!("https://storage/{}", path))
    }
}

#[derive(Default)]
pub struct MockDocumentStore {
    documents: Mutex<HashMap<(String, String), HashMap<String, String>>>,
    writes: Mutex<usize>,
    failure: Option<String>,
}

impl MockDocumentStore {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn field(&self, collection: &str, document_id: &str, field: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), document_id.to_string()))
            .and_then(|doc| doc.get(field).cloned())
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn update_field(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
        value: &str,
        _auth_token: &str,
    ) -> Result<(), PersistError> {
        if let Some(message) = &self.failure {
            return Err(PersistError::Transport(message.clone()));
        }
        *self.writes.lock().unwrap() += 1;
        self.documents
            .lock()
            .unwrap()
            .entry((collection.to_string(), document_id.to_string()))
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn get_field(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
        _auth_token: &str,
    ) -> Result<Option<String>, PersistError> {
        Ok(self.field(collection, document_id, field))
    }
}

/// Fully wired pipeline over the mocks above.
pub struct Harness {
    pub identity: Arc<MockIdentity>,
    pub objects: Arc<MockObjectStore>,
    pub documents: Arc<MockDocumentStore>,
    pub gateway: Arc<CredentialGateway>,
    pub broker: Arc<MediaCaptureBroker>,
    pub capture_dir: PathBuf,
    pub profiles: Arc<ProfileRecordStore>,
    pub pipeline: Arc<CapturePipeline>,
}

impl Harness {
    pub fn new(permission: PermissionState) -> Self {
        Self::build(permission, MockObjectStore::default())
    }

    pub fn with_failing_storage(permission: PermissionState, message: &str) -> Self {
        Self::build(permission, MockObjectStore::failing(message))
    }

    fn build(permission: PermissionState, objects: MockObjectStore) -> Self {
        let identity = Arc::new(MockIdentity::default());
        let objects = Arc::new(objects);
        let documents = Arc::new(MockDocumentStore::default());

        let gateway = Arc::new(CredentialGateway::new(identity.clone(), SessionStore::new()));
        let capture_dir = scratch_dir();
        let broker = Arc::new(MediaCaptureBroker::new(
            Arc::new(ConsentGate::new(permission)),
            Arc::new(MockCamera::succeeding()),
            capture_dir.clone(),
        ));
        let uploader = Arc::new(AssetUploader::new(objects.clone()));
        let profiles = Arc::new(ProfileRecordStore::new(documents.clone()));
        let pipeline = Arc::new(CapturePipeline::new(
            gateway.clone(),
            broker.clone(),
            uploader,
            profiles.clone(),
        ));

        Self {
            identity,
            objects,
            documents,
            gateway,
            broker,
            capture_dir,
            profiles,
            pipeline,
        }
    }

    pub async fn sign_in(&self, user_id: &str) {
        self.gateway.sessions().set(session_for(user_id)).await;
    }
}
