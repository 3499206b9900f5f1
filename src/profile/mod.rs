//! Profile photo capture: sign-in, capture, upload, profile update

pub mod asset_uploader;
pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod profile_store;
pub mod session;

pub use asset_uploader::{AssetUploader, ObjectStore, RemoteAssetRef};
pub use auth::{CredentialGateway, FederatedFlow, IdentityProvider};
pub use capture::{CapturedAsset, MediaCaptureBroker, PermissionState};
pub use config::ProfileConfig;
pub use error::{AuthError, CaptureError, PersistError, PipelineError, UploadError};
pub use pipeline::{CapturePipeline, PipelineEvent, PipelineStage};
pub use profile_store::{DocumentStore, ProfileRecordStore};
pub use session::{Session, SessionStore};
