//! Capture → upload → persist chain

use crate::profile::asset_uploader::{AssetUploader, RemoteAssetRef};
use crate::profile::auth::CredentialGateway;
use crate::profile::capture::{MediaCaptureBroker, PermissionState};
use crate::profile::error::{CaptureError, PersistError, PipelineError};
use crate::profile::profile_store::ProfileRecordStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    PermissionRequested,
    Capturing,
    Captured,
    Uploading,
    Uploaded,
    Persisting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageChanged {
        run_id: Uuid,
        stage: PipelineStage,
    },
    Failed {
        run_id: Uuid,
        stage: PipelineStage,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub asset_id: Uuid,
    pub user_id: String,
    pub remote: RemoteAssetRef,
}

pub struct CapturePipeline {
    gateway: Arc<CredentialGateway>,
    broker: Arc<MediaCaptureBroker>,
    uploader: Arc<AssetUploader>,
    profiles: Arc<ProfileRecordStore>,
    events: broadcast::Sender<PipelineEvent>,
}

impl CapturePipeline {
    pub fn new(
        gateway: Arc<CredentialGateway>,
        broker: Arc<MediaCaptureBroker>,
        uploader: Arc<AssetUploader>,
        profiles: Arc<ProfileRecordStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            broker,
            uploader,
            profiles,
            events,
        }
    }

    /// Stage transitions and failures of every run.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// One full capture. Any failure ends the run and returns to `Idle`.
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let mut stage = PipelineStage::Idle;

        match self.execute(run_id, &mut stage).await {
            Ok(outcome) => {
                self.enter(run_id, &mut stage, PipelineStage::Done);
                info!(
                    "Capture run {} done: {}",
                    run_id, outcome.remote.object_path
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Capture run {} failed while {:?}: {}", run_id, stage, e);
                let _ = self.events.send(PipelineEvent::Failed {
                    run_id,
                    stage,
                    error: e.to_string(),
                });
                self.enter(run_id, &mut stage, PipelineStage::Idle);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        stage: &mut PipelineStage,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.enter(run_id, stage, PipelineStage::PermissionRequested);
        match self.broker.request_capture_permission().await {
            PermissionState::Granted => {}
            PermissionState::Denied => return Err(CaptureError::PermissionDenied.into()),
            PermissionState::NotDetermined => {
                return Err(CaptureError::PermissionNotDetermined.into())
            }
        }

        // No point taking a photo nobody can upload.
        if self.gateway.active_session().await.is_none() {
            return Err(PipelineError::Unauthenticated);
        }

        self.enter(run_id, stage, PipelineStage::Capturing);
        let asset = self.broker.begin_capture().await?;
        let asset_id = asset.id;
        self.enter(run_id, stage, PipelineStage::Captured);

        self.enter(run_id, stage, PipelineStage::Uploading);
        let session = match self.gateway.active_session().await {
            Some(session) => session,
            None => {
                asset.discard().await;
                return Err(PipelineError::Unauthenticated);
            }
        };
        let remote = self.uploader.upload(asset, &session).await?;
        self.enter(run_id, stage, PipelineStage::Uploaded);

        // The session may have ended while the upload was in flight.
        self.enter(run_id, stage, PipelineStage::Persisting);
        let session = self
            .gateway
            .active_session()
            .await
            .ok_or(PersistError::NoSession)?;
        self.profiles
            .attach_asset_ref(Some(&session), &remote)
            .await?;

        Ok(PipelineOutcome {
            run_id,
            asset_id,
            user_id: session.user_id,
            remote,
        })
    }

    fn enter(&self, run_id: Uuid, current: &mut PipelineStage, next: PipelineStage) {
        *current = next;
        let _ = self
            .events
            .send(PipelineEvent::StageChanged { run_id, stage: next });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::error::UploadError;
    use crate::profile::profile_store::PROFILE_IMAGE_FIELD;
    use crate::testing::Harness;
    use std::collections::HashSet;

    fn stages_of(events: &[PipelineEvent]) -> Vec<PipelineStage> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageChanged { stage, .. } => Some(*stage),
                PipelineEvent::Failed { .. } => None,
            })
            .collect()
    }

    fn files_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    fn drain(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn full_run_records_url_on_profile() {
        let harness = Harness::new(PermissionState::Granted);
        harness.sign_in("u1").await;
        let mut rx = harness.pipeline.subscribe();

        let outcome = harness.pipeline.run().await.unwrap();

        let expected_path = format!("user_faces/u1/{}.jpg", outcome.asset_id);
        assert_eq!(outcome.user_id, "u1");
        assert_eq!(outcome.remote.object_path, expected_path);
        assert_eq!(outcome.remote.url, format!("https://storage/{}", expected_path));
        assert_eq!(
            harness.documents.field("users", "u1", PROFILE_IMAGE_FIELD),
            Some(outcome.remote.url.clone())
        );

        assert_eq!(
            stages_of(&drain(&mut rx)),
            vec![
                PipelineStage::PermissionRequested,
                PipelineStage::Capturing,
                PipelineStage::Captured,
                PipelineStage::Uploading,
                PipelineStage::Uploaded,
                PipelineStage::Persisting,
                PipelineStage::Done,
            ]
        );
    }

    #[tokio::test]
    async fn rerun_overwrites_profile_image() {
        let harness = Harness::new(PermissionState::Granted);
        harness.sign_in("u1").await;

        let first = harness.pipeline.run().await.unwrap();
        let second = harness.pipeline.run().await.unwrap();

        assert_ne!(first.remote.url, second.remote.url);
        assert_eq!(
            harness.documents.field("users", "u1", PROFILE_IMAGE_FIELD),
            Some(second.remote.url)
        );
        assert_eq!(harness.documents.document_count(), 1);
    }

    #[tokio::test]
    async fn permission_denied_returns_to_idle() {
        let harness = Harness::new(PermissionState::Denied);
        harness.sign_in("u1").await;
        let mut rx = harness.pipeline.subscribe();

        let err = harness.pipeline.run().await.unwrap_err();
        assert_eq!(err, PipelineError::Capture(CaptureError::PermissionDenied));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::Failed { stage: PipelineStage::PermissionRequested, .. }
        )));
        assert_eq!(stages_of(&events).last(), Some(&PipelineStage::Idle));
        assert!(harness.objects.is_empty());
    }

    #[tokio::test]
    async fn upload_without_session_is_rejected() {
        let harness = Harness::new(PermissionState::Granted);

        let mut rx = harness.pipeline.subscribe();

        let err = harness.pipeline.run().await.unwrap_err();

        assert_eq!(err, PipelineError::Unauthenticated);
        assert!(!stages_of(&drain(&mut rx)).contains(&PipelineStage::Capturing));
        assert!(harness.objects.is_empty());
        assert_eq!(harness.documents.write_count(), 0);
        assert_eq!(files_in(&harness.capture_dir), 0);
    }

    #[tokio::test]
    async fn runs_leave_no_local_files() {
        let harness = Harness::new(PermissionState::Granted);
        harness.sign_in("u1").await;
        for _ in 0..3 {
            harness.pipeline.run().await.unwrap();
        }
        assert_eq!(harness.objects.paths().len(), 3);

        harness.gateway.sign_out().await;
        assert!(harness.pipeline.run().await.is_err());

        assert_eq!(files_in(&harness.capture_dir), 0);
    }

    #[tokio::test]
    async fn upload_failure_skips_persistence() {
        let harness = Harness::with_failing_storage(PermissionState::Granted, "network down");
        harness.sign_in("u1").await;

        let err = harness.pipeline.run().await.unwrap_err();

        assert_eq!(
            err,
            PipelineError::Upload(UploadError::Transport("network down".to_string()))
        );
        assert_eq!(harness.documents.write_count(), 0);
        assert_eq!(files_in(&harness.capture_dir), 0);
    }

    #[tokio::test]
    async fn concurrent_runs_produce_distinct_refs() {
        let harness = Harness::new(PermissionState::Granted);
        harness.sign_in("u1").await;

        let (a, b) = tokio::join!(harness.pipeline.run(), harness.pipeline.run());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.run_id, b.run_id);
        assert_ne!(a.asset_id, b.asset_id);
        assert_ne!(a.remote, b.remote);

        let stored: HashSet<_> = harness.objects.paths().into_iter().collect();
        assert!(stored.contains(&a.remote.object_path));
        assert!(stored.contains(&b.remote.object_path));
    }
}
