//! HTTP API the UI front end drives

use crate::profile::auth::FederatedFlow;
use crate::profile::capture::PermissionState;
use crate::profile::error::{AuthError, CaptureError, PersistError, PipelineError};
use crate::profile::session::SignInMethod;
use crate::profile::{
    CapturePipeline, CredentialGateway, MediaCaptureBroker, ProfileRecordStore, Session,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CredentialGateway>,
    pub broker: Arc<MediaCaptureBroker>,
    pub pipeline: Arc<CapturePipeline>,
    pub profiles: Arc<ProfileRecordStore>,
    pub federated: Option<Arc<dyn FederatedFlow>>,
}

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct FederatedRequest {
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionDecision {
    pub granted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub user_id: String,
    pub email: Option<String>,
    pub method: SignInMethod,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub session: Option<SessionView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub permission: PermissionState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub success: bool,
    pub message: String,
    pub run_id: Option<Uuid>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub signed_in: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            method: session.method,
            expires_at: session.expires_at,
        }
    }
}

// Configure routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/federated", post(federated_sign_in))
        .route("/auth/google", post(google_sign_in))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(current_session))
        .route(
            "/capture/permission",
            get(permission_status).post(permission_decision),
        )
        .route("/capture", post(capture))
        .route("/profile", get(profile))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let signed_in = state.gateway.active_session().await.is_some();
    Json(StatusResponse {
        status: "ok".to_string(),
        service: "face-profile".to_string(),
        signed_in,
    })
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let result = state
        .gateway
        .sign_in_with_password(&payload.email, &payload.password)
        .await;
    session_reply("Login", result)
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let result = state
        .gateway
        .register_with_password(&payload.email, &payload.password)
        .await;
    session_reply("Sign up", result)
}

async fn federated_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<FederatedRequest>,
) -> impl IntoResponse {
    let result = state
        .gateway
        .sign_in_with_federated_token(payload.id_token)
        .await;
    session_reply("Google sign-in", result)
}

async fn google_sign_in(State(state): State<AppState>) -> impl IntoResponse {
    let Some(flow) = state.federated.clone() else {
        return (
            StatusCode::NOT_IMPLEMENTED,
            Json(SessionResponse {
                success: false,
                message: "Google sign-in is not configured".to_string(),
                session: None,
            }),
        );
    };

    let result = state
        .gateway
        .sign_in_with_federated_flow(flow.as_ref())
        .await;
    session_reply("Google sign-in", result)
}

async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    state.gateway.sign_out().await;
    Json(SessionResponse {
        success: true,
        message: "Signed out".to_string(),
        session: None,
    })
}

async fn current_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.gateway.active_session().await {
        Some(session) => (
            StatusCode::OK,
            Json(SessionResponse {
                success: true,
                message: "Signed in".to_string(),
                session: Some(SessionView::from(&session)),
            }),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(SessionResponse {
                success: false,
                message: "Not signed in".to_string(),
                session: None,
            }),
        ),
    }
}

async fn permission_status(State(state): State<AppState>) -> impl IntoResponse {
    let permission = state.broker.request_capture_permission().await;
    Json(PermissionResponse { permission })
}

async fn permission_decision(
    State(state): State<AppState>,
    Json(payload): Json<PermissionDecision>,
) -> impl IntoResponse {
    state
        .broker
        .record_permission_decision(payload.granted)
        .await;
    let permission = state.broker.request_capture_permission().await;
    Json(PermissionResponse { permission })
}

async fn capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.run().await {
        Ok(outcome) => {
            info!(
                "Profile photo updated for '{}' (run {})",
                outcome.user_id, outcome.run_id
            );
            (
                StatusCode::CREATED,
                Json(CaptureResponse {
                    success: true,
                    message: "Photo uploaded".to_string(),
                    run_id: Some(outcome.run_id),
                    image_url: Some(outcome.remote.url),
                }),
            )
        }
        Err(e) => (
            pipeline_status(&e),
            Json(CaptureResponse {
                success: false,
                message: format!("Capture failed: {}", e),
                run_id: None,
                image_url: None,
            }),
        ),
    }
}

async fn profile(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.gateway.active_session().await;
    match state.profiles.profile_image_url(session.as_ref()).await {
        Ok(url) => (
            StatusCode::OK,
            Json(ProfileResponse {
                success: true,
                message: "ok".to_string(),
                profile_image_url: url,
            }),
        ),
        Err(e) => (
            persist_status(&e),
            Json(ProfileResponse {
                success: false,
                message: e.to_string(),
                profile_image_url: None,
            }),
        ),
    }
}

fn session_reply(
    action: &str,
    result: Result<Session, AuthError>,
) -> (StatusCode, Json<SessionResponse>) {
    match result {
        Ok(session) => (
            StatusCode::OK,
            Json(SessionResponse {
                success: true,
                message: format!("{} succeeded", action),
                session: Some(SessionView::from(&session)),
            }),
        ),
        Err(e) => {
            warn!("{} failed: {}", action, e);
            (
                auth_status(&e),
                Json(SessionResponse {
                    success: false,
                    message: format!("{} failed: {}", action, e),
                    session: None,
                }),
            )
        }
    }
}

fn auth_status(e: &AuthError) -> StatusCode {
    match e {
        AuthError::InvalidInput(_) | AuthError::TokenMissing => StatusCode::BAD_REQUEST,
        AuthError::Rejected { .. } => StatusCode::UNAUTHORIZED,
        AuthError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

fn persist_status(e: &PersistError) -> StatusCode {
    match e {
        PersistError::NoSession => StatusCode::UNAUTHORIZED,
        PersistError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

fn pipeline_status(e: &PipelineError) -> StatusCode {
    match e {
        PipelineError::Capture(CaptureError::PermissionDenied)
        | PipelineError::Capture(CaptureError::PermissionNotDetermined) => StatusCode::FORBIDDEN,
        PipelineError::Capture(CaptureError::Cancelled) => StatusCode::CONFLICT,
        PipelineError::Capture(CaptureError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        PipelineError::Unauthenticated => StatusCode::UNAUTHORIZED,
        PipelineError::Upload(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Persist(e) => persist_status(e),
    }
}
