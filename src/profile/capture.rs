//! Camera permission gate and photo capture
//! Each capture gets its own file: {capture_dir}/face_{uuid}.jpg

use crate::profile::error::CaptureError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    NotDetermined,
}

/// A photo on local disk waiting to be uploaded.
#[derive(Debug, PartialEq, Eq)]
pub struct CapturedAsset {
    pub id: Uuid,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

impl CapturedAsset {
    pub fn uri(&self) -> String {
        format!("local://{}", self.path.display())
    }

    /// Delete the local file. The asset is spent afterwards.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove capture {}: {}", self.path.display(), e),
        }
    }
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn status(&self) -> PermissionState;

    /// Ask for access. Returns the state after asking.
    async fn request(&self) -> PermissionState;

    /// The user's answer to a prompt shown by the UI.
    async fn record_decision(&self, granted: bool);
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Write a photo to `target`. `false` means the user backed out or the
    /// device failed.
    async fn capture_to(&self, target: &Path) -> bool;
}

/// Permission state driven by the UI's prompt answers.
pub struct ConsentGate {
    state: RwLock<PermissionState>,
}

impl ConsentGate {
    pub fn new(initial: PermissionState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl PermissionGate for ConsentGate {
    async fn status(&self) -> PermissionState {
        *self.state.read().await
    }

    async fn request(&self) -> PermissionState {
        let state = *self.state.read().await;
        if state == PermissionState::NotDetermined {
            info!("Camera permission not determined; waiting for user decision");
        }
        state
    }

    async fn record_decision(&self, granted: bool) {
        let next = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        *self.state.write().await = next;
        info!("Camera permission recorded as {:?}", next);
    }
}

/// Runs an external capture program, e.g. `fswebcam` or `libcamera-still`.
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    /// `command[0]` is the program; `{output}` in any argument is replaced
    /// with the target path.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, target: &Path) -> Vec<String> {
        let target = target.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{output}", &target))
            .collect()
    }
}

#[async_trait]
impl CameraDevice for CommandCamera {
    async fn capture_to(&self, target: &Path) -> bool {
        let status = Command::new(&self.program)
            .args(self.render_args(target))
            .status()
            .await;

        match status {
            Ok(status) if status.success() => tokio::fs::metadata(target)
                .await
                .map(|m| m.len() > 0)
                .unwrap_or(false),
            Ok(status) => {
                warn!("Camera command '{}' exited with {}", self.program, status);
                false
            }
            Err(e) => {
                warn!("Failed to run camera command '{}': {}", self.program, e);
                false
            }
        }
    }
}

pub struct MediaCaptureBroker {
    permissions: Arc<dyn PermissionGate>,
    camera: Arc<dyn CameraDevice>,
    capture_dir: PathBuf,
}

impl MediaCaptureBroker {
    pub fn new(
        permissions: Arc<dyn PermissionGate>,
        camera: Arc<dyn CameraDevice>,
        capture_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            permissions,
            camera,
            capture_dir: capture_dir.into(),
        }
    }

    pub async fn request_capture_permission(&self) -> PermissionState {
        match self.permissions.status().await {
            PermissionState::Granted => PermissionState::Granted,
            _ => self.permissions.request().await,
        }
    }

    pub async fn record_permission_decision(&self, granted: bool) {
        self.permissions.record_decision(granted).await;
    }

    /// Allocate a fresh target and run the camera into it.
    pub async fn begin_capture(&self) -> Result<CapturedAsset, CaptureError> {
        match self.permissions.status().await {
            PermissionState::Granted => {}
            PermissionState::Denied => return Err(CaptureError::PermissionDenied),
            PermissionState::NotDetermined => return Err(CaptureError::PermissionNotDetermined),
        }

        tokio::fs::create_dir_all(&self.capture_dir)
            .await
            .map_err(|e| {
                CaptureError::Storage(format!(
                    "cannot create '{}': {}",
                    self.capture_dir.display(),
                    e
                ))
            })?;

        let id = Uuid::new_v4();
        let path = self.capture_dir.join(format!("face_{}.jpg", id));

        if !self.camera.capture_to(&path).await {
            // Drop partial output; nothing else will ever read it.
            let _ = tokio::fs::remove_file(&path).await;
            info!("Capture {} cancelled", id);
            return Err(CaptureError::Cancelled);
        }

        info!("Captured photo {} at {}", id, path.display());
        Ok(CapturedAsset {
            id,
            path,
            captured_at: Utc::now(),
        })
    }
}
