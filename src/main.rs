use anyhow::Context;
use clap::Parser;
use face_profile::api::{create_router, AppState};
use face_profile::firebase::{
    FirebaseIdentity, FirebaseStorage, FirestoreDocuments, GoogleSignIn, RestClient,
};
use face_profile::profile::auth::FederatedFlow;
use face_profile::profile::capture::{CommandCamera, ConsentGate};
use face_profile::profile::{
    AssetUploader, CapturePipeline, CredentialGateway, MediaCaptureBroker, PipelineEvent,
    ProfileConfig, ProfileRecordStore, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[clap(long, default_value = "config.toml")]
    config: String,

    /// Overrides `listen_addr` from the config file
    #[clap(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = ProfileConfig::load(&args.config)
        .with_context(|| format!("load config {}", args.config))?;
    if let Some(addr) = args.listen {
        cfg = cfg.with_listen_addr(addr);
    }

    let rest = RestClient::new(Duration::from_millis(cfg.request_timeout_ms))
        .context("build HTTPS client")?;

    let gateway = Arc::new(CredentialGateway::new(
        Arc::new(FirebaseIdentity::new(rest.clone(), &cfg.firebase)),
        SessionStore::new(),
    ));

    let camera = CommandCamera::from_command(&cfg.capture.camera_command)
        .context("capture.camera_command is empty")?;
    let broker = Arc::new(MediaCaptureBroker::new(
        Arc::new(ConsentGate::new(cfg.capture.initial_permission)),
        Arc::new(camera),
        cfg.capture.capture_dir.clone(),
    ));

    let uploader = Arc::new(AssetUploader::new(Arc::new(FirebaseStorage::new(
        rest.clone(),
        &cfg.firebase,
    ))));
    let profiles = Arc::new(ProfileRecordStore::new(Arc::new(FirestoreDocuments::new(
        rest,
        &cfg.firebase,
    ))));

    let pipeline = Arc::new(CapturePipeline::new(
        gateway.clone(),
        broker.clone(),
        uploader,
        profiles.clone(),
    ));

    let federated: Option<Arc<dyn FederatedFlow>> = match &cfg.google {
        Some(google) => {
            let flow: Arc<dyn FederatedFlow> = Arc::new(
                GoogleSignIn::new(google)
                    .await
                    .context("set up Google sign-in")?,
            );
            Some(flow)
        }
        None => {
            info!("No [google] section; Google sign-in disabled");
            None
        }
    };

    let mut events = pipeline.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PipelineEvent::Failed {
                    run_id,
                    stage,
                    error,
                }) => {
                    error!(%run_id, ?stage, %error, "capture pipeline failed");
                }
                Ok(PipelineEvent::StageChanged { run_id, stage }) => {
                    tracing::debug!(%run_id, ?stage, "capture pipeline stage");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Pipeline event log skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = create_router(AppState {
        gateway,
        broker,
        pipeline,
        profiles,
        federated,
    });

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;
    info!("Profile service listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("serve HTTP API")?;

    Ok(())
}
