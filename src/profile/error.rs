//! Error types for the capture and profile pipeline

use crate::firebase::TransportError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication rejected: {message}")]
    Rejected { message: String },

    #[error("Federated sign-in returned no identity token")]
    TokenMissing,

    #[error("Identity provider unreachable: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera permission has not been granted yet")]
    PermissionNotDetermined,

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Capture target unavailable: {0}")]
    Storage(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Captured asset unreadable: {0}")]
    AssetUnreadable(String),

    #[error("Upload failed: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    #[error("No authenticated session")]
    NoSession,

    #[error("Profile update failed: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Upload requires an authenticated session")]
    Unauthenticated,

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        AuthError::Transport(e.to_string())
    }
}

impl From<TransportError> for UploadError {
    fn from(e: TransportError) -> Self {
        UploadError::Transport(e.to_string())
    }
}

impl From<TransportError> for PersistError {
    fn from(e: TransportError) -> Self {
        PersistError::Transport(e.to_string())
    }
}
