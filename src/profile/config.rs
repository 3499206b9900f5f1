//! Configuration for the profile capture service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::profile::capture::PermissionState;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub listen_addr: String,
    /// Upper bound for every call to an external provider
    pub request_timeout_ms: u64,
    pub firebase: FirebaseConfig,
    pub capture: CaptureConfig,
    pub google: Option<GoogleSignInConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Web API key of the Firebase project
    pub api_key: String,
    pub project_id: String,
    /// e.g. "my-project.appspot.com"
    pub storage_bucket: String,
    pub identity_endpoint: String,
    pub token_endpoint: String,
    pub storage_endpoint: String,
    pub firestore_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub capture_dir: PathBuf,
    /// Program and arguments; `{output}` is replaced with the target file
    pub camera_command: Vec<String>,
    pub initial_permission: PermissionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSignInConfig {
    /// OAuth client secret JSON downloaded from the Google console
    pub client_secret_path: PathBuf,
    pub token_cache_path: PathBuf,
}

impl ProfileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ProfileConfig = toml::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.firebase.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("firebase.api_key"));
        }
        if self.firebase.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("firebase.project_id"));
        }
        if self.firebase.storage_bucket.trim().is_empty() {
            return Err(ConfigError::Missing("firebase.storage_bucket"));
        }
        if self.capture.camera_command.is_empty() {
            return Err(ConfigError::Missing("capture.camera_command"));
        }
        Ok(())
    }

    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_google(mut self, google: GoogleSignInConfig) -> Self {
        self.google = Some(google);
        self
    }
}

impl FirebaseConfig {
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        storage_bucket: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            storage_bucket: storage_bucket.into(),
            ..Self::default()
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            request_timeout_ms: 15_000,
            firebase: FirebaseConfig::default(),
            capture: CaptureConfig::default(),
            google: None,
        }
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            storage_bucket: String::new(),
            identity_endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
            token_endpoint: "https://securetoken.googleapis.com/v1".to_string(),
            storage_endpoint: "https://firebasestorage.googleapis.com/v0".to_string(),
            firestore_endpoint: "https://firestore.googleapis.com/v1".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_dir: PathBuf::from("captures"),
            camera_command: vec![
                "fswebcam".to_string(),
                "--no-banner".to_string(),
                "{output}".to_string(),
            ],
            initial_permission: PermissionState::NotDetermined,
        }
    }
}
