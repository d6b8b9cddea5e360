use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use templater_core::CoreError;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Orchestrator(OrchestratorError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Orchestrator(err) => {
                let message = err.to_string();
                match err {
                    OrchestratorError::Core(CoreError::Validation(_)) => {
                        (StatusCode::BAD_REQUEST, "bad_request", message)
                    }
                    OrchestratorError::Core(_)
                    | OrchestratorError::AlreadyRunning
                    | OrchestratorError::NotRunning
                    | OrchestratorError::NotPaused => (StatusCode::CONFLICT, "conflict", message),
                    OrchestratorError::Remote(_)
                    | OrchestratorError::PreconditionFailed(_)
                    | OrchestratorError::EmptyResponse { .. }
                    | OrchestratorError::Stalled { .. } => {
                        tracing::error!("Generation service error: {}", message);
                        (StatusCode::BAD_GATEWAY, "generation_service_error", message)
                    }
                    OrchestratorError::TaskJoin(_) => {
                        tracing::error!("Orchestrator error: {}", message);
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
                    }
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}
