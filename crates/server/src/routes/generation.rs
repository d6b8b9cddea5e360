use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use orchestrator::GenerationHandle;
use serde::{Deserialize, Serialize};
use templater_core::{Artifact, EntityId, GenerationSnapshot, SessionInput};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartGenerationRequest {
    /// Document the templates are generated from
    pub input_document: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub domain_hint: String,
}

impl From<StartGenerationRequest> for SessionInput {
    fn from(request: StartGenerationRequest) -> Self {
        SessionInput::new(
            request.input_document,
            request.instructions,
            request.domain_hint,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStartedResponse {
    pub session_id: Uuid,
    pub generation: u64,
}

impl From<&GenerationHandle> for GenerationStartedResponse {
    fn from(handle: &GenerationHandle) -> Self {
        Self {
            session_id: handle.session_id,
            generation: handle.generation,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/generation",
    responses(
        (status = 200, description = "Current session, progress and artifacts")
    ),
    tag = "generation"
)]
pub async fn get_generation(State(state): State<AppState>) -> Json<GenerationSnapshot> {
    Json(state.controller.snapshot().await)
}

#[utoipa::path(
    post,
    path = "/api/generation/start",
    request_body = StartGenerationRequest,
    responses(
        (status = 202, description = "Generation started", body = GenerationStartedResponse),
        (status = 400, description = "Empty input document", body = crate::error::ErrorResponse),
        (status = 409, description = "A session is already generating", body = crate::error::ErrorResponse)
    ),
    tag = "generation"
)]
pub async fn start_generation(
    State(state): State<AppState>,
    Json(payload): Json<StartGenerationRequest>,
) -> Result<(StatusCode, Json<GenerationStartedResponse>), AppError> {
    let handle = state.controller.start(payload.into()).await?;

    info!(
        session_id = %handle.session_id,
        generation = handle.generation,
        "Generation started via API"
    );

    // The loop reports its own outcome through session state and events.
    Ok((StatusCode::ACCEPTED, Json(GenerationStartedResponse::from(&handle))))
}

#[utoipa::path(
    post,
    path = "/api/generation/pause",
    responses(
        (status = 202, description = "Pause requested; takes effect after the in-flight step"),
        (status = 409, description = "No session is generating", body = crate::error::ErrorResponse)
    ),
    tag = "generation"
)]
pub async fn pause_generation(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<GenerationSnapshot>), AppError> {
    let snapshot = state.controller.pause().await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

#[utoipa::path(
    post,
    path = "/api/generation/resume",
    responses(
        (status = 202, description = "Paused session continued as a new session", body = GenerationStartedResponse),
        (status = 409, description = "No paused session", body = crate::error::ErrorResponse)
    ),
    tag = "generation"
)]
pub async fn resume_generation(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<GenerationStartedResponse>), AppError> {
    let handle = state.controller.resume().await?;

    info!(
        session_id = %handle.session_id,
        generation = handle.generation,
        "Generation resumed via API"
    );

    Ok((StatusCode::ACCEPTED, Json(GenerationStartedResponse::from(&handle))))
}

#[utoipa::path(
    post,
    path = "/api/generation/reset",
    responses(
        (status = 200, description = "Session discarded, back to idle")
    ),
    tag = "generation"
)]
pub async fn reset_generation(State(state): State<AppState>) -> Json<GenerationSnapshot> {
    Json(state.controller.reset().await)
}

#[utoipa::path(
    get,
    path = "/api/generation/artifacts",
    responses(
        (status = 200, description = "Recorded artifacts in first-seen order")
    ),
    tag = "generation"
)]
pub async fn list_artifacts(State(state): State<AppState>) -> Json<Vec<Artifact>> {
    Json(state.controller.artifacts().await)
}

#[utoipa::path(
    get,
    path = "/api/generation/artifacts/{id}",
    params(
        ("id" = String, Path, description = "Artifact ID")
    ),
    responses(
        (status = 200, description = "Artifact found"),
        (status = 404, description = "Artifact not found", body = crate::error::ErrorResponse)
    ),
    tag = "generation"
)]
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Artifact>, AppError> {
    state
        .controller
        .artifact(&EntityId::from(id.as_str()))
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Artifact not found: {}", id)))
}
